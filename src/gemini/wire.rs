//! generateContent wire format

use super::types::{InlineImage, Message, Part};
use crate::response::ResponsePart;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

impl GeminiRequest {
    pub fn new(messages: &[Message], with_images: bool) -> Self {
        Self {
            contents: messages.iter().map(GeminiContent::from_message).collect(),
            generation_config: with_images.then(|| GeminiGenerationConfig {
                response_modalities: vec!["Text".to_string(), "Image".to_string()],
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn from_message(message: &Message) -> Self {
        Self {
            role: Some(message.role.as_str().to_string()),
            parts: message.parts.iter().map(GeminiPart::from_part).collect(),
        }
    }
}

/// One part of a content block. Upstream and some proxies emit either
/// `inlineData` or `inline_data`, so both spellings are accepted.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(
        default,
        alias = "inline_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn from_part(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::Image(image) => Self {
                text: None,
                inline_data: Some(GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: BASE64.encode(&image.data),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    #[serde(alias = "mime_type", default = "default_mime")]
    pub mime_type: String,
    pub data: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiError,
}

#[derive(Debug, Deserialize)]
pub struct GeminiError {
    #[serde(default)]
    pub message: String,
    #[allow(dead_code)]
    pub code: Option<i32>,
    #[allow(dead_code)]
    pub status: Option<String>,
}

/// Finish reasons that end in a terminal content-policy refusal
pub const REFUSAL_FINISH_REASONS: &[&str] = &["IMAGE_SAFETY", "SAFETY", "RECITATION"];

impl GeminiCandidate {
    /// Decode parts in order. Images whose base64 does not decode are
    /// dropped with a warning.
    pub fn decode_parts(self) -> Vec<ResponsePart> {
        let Some(content) = self.content else {
            return Vec::new();
        };
        let mut decoded = Vec::with_capacity(content.parts.len());
        for (index, part) in content.parts.into_iter().enumerate() {
            if let Some(inline) = part.inline_data {
                match BASE64.decode(inline.data.trim()) {
                    Ok(bytes) => {
                        decoded.push(ResponsePart::Image(InlineImage::new(
                            bytes,
                            inline.mime_type,
                        )));
                    }
                    Err(e) => {
                        tracing::warn!(part = index, error = %e, "Skipping undecodable inline image");
                    }
                }
            } else if let Some(text) = part.text {
                decoded.push(ResponsePart::Text(text));
            }
        }
        decoded
    }

    /// Text of all text parts, used to explain refusals
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::{test_png, Role};
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let messages = vec![
            Message::user_text("draw a fox"),
            Message::new(Role::Model, vec![Part::text("here"), Part::Image(test_png(16))]),
        ];
        let body = serde_json::to_value(GeminiRequest::new(&messages, true)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "draw a fox");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["contents"][1]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["Text", "Image"])
        );
    }

    #[test]
    fn test_text_request_omits_modalities() {
        let body =
            serde_json::to_value(GeminiRequest::new(&[Message::user_text("hi")], false)).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_decode_accepts_both_spellings() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "one"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAEC"}},
                    {"inline_data": {"mime_type": "image/jpeg", "data": "AwQF"}},
                    {"inlineData": {"mimeType": "image/png", "data": "***not base64***"}}
                ]}
            }]
        });
        let resp: GeminiResponse = serde_json::from_value(body).unwrap();
        let parts = resp.candidates.into_iter().next().unwrap().decode_parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], ResponsePart::Text("one".to_string()));
        assert!(matches!(&parts[1], ResponsePart::Image(img) if &img.data[..] == [0, 1, 2]));
        assert!(matches!(&parts[2], ResponsePart::Image(img) if img.mime_type == "image/jpeg"));
    }
}
