//! Common types for Gemini interactions

use std::fmt;
use std::sync::Arc;

/// Raw image bytes plus their declared MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub data: Arc<[u8]>,
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build an image from uploaded bytes, detecting the MIME type from
    /// magic bytes. Returns `None` for empty or unrecognised payloads.
    pub fn sniff(data: impl Into<Arc<[u8]>>) -> Option<Self> {
        let data = data.into();
        let mime_type = sniff_mime(&data)?;
        Some(Self {
            data,
            mime_type: mime_type.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Image payloads are megabytes of noise in logs
impl fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && data.get(8..12) == Some(&b"WEBP"[..]) {
        Some("image/webp")
    } else {
        None
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Content part in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image(InlineImage),
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Concatenated text of all text parts
    #[cfg(test)]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    #[cfg(test)]
    pub fn images(&self) -> impl Iterator<Item = &InlineImage> {
        self.parts.iter().filter_map(|part| match part {
            Part::Image(image) => Some(image),
            Part::Text(_) => None,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_png(len: usize) -> InlineImage {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(len.max(8), 7);
    InlineImage::new(data, "image/png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_known_formats() {
        let png = test_png(32);
        assert_eq!(
            InlineImage::sniff(png.data.to_vec()).map(|i| i.mime_type),
            Some("image/png".to_string())
        );
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
        assert_eq!(
            InlineImage::sniff(jpeg).map(|i| i.mime_type),
            Some("image/jpeg".to_string())
        );
        let mut webp = b"RIFF\0\0\0\0WEBP".to_vec();
        webp.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            InlineImage::sniff(webp).map(|i| i.mime_type),
            Some("image/webp".to_string())
        );
    }

    #[test]
    fn test_sniff_rejects_garbage() {
        assert!(InlineImage::sniff(Vec::new()).is_none());
        assert!(InlineImage::sniff(b"hello world".to_vec()).is_none());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let rendered = format!("{:?}", test_png(4096));
        assert!(rendered.contains("len: 4096"));
        assert!(rendered.len() < 80);
    }

    #[test]
    fn test_message_text_skips_images() {
        let msg = Message::new(
            Role::Model,
            vec![Part::text("a"), Part::Image(test_png(16)), Part::text("b")],
        );
        assert_eq!(msg.text(), "ab");
        assert_eq!(msg.images().count(), 1);
    }
}
