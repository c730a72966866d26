//! Response decomposition and delivery order
//!
//! A generateContent answer is an ordered list of text and image parts. Each
//! image is paired with the text that precedes it; text after the last image
//! is kept as a trailing message. Replies are delivered text-then-image per
//! pair, in upstream order, trailing text last.

use crate::gemini::InlineImage;

/// Phrases that mark a "still working on it" answer instead of a result
const WAIT_KEYWORDS: &[&str] = &[
    "请稍等",
    "正在生成",
    "请等待",
    "正在处理",
    "processing",
    "generating",
    "please wait",
    "working on it",
];

/// A decoded upstream part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    Image(InlineImage),
}

/// One outbound message for the chat front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image(InlineImage),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// An image with the text that led up to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTextPair {
    pub image: InlineImage,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedResponse {
    pub pairs: Vec<ImageTextPair>,
    pub trailing_text: Option<String>,
}

/// Pair every image with the text parts since the previous image.
pub fn decompose(parts: Vec<ResponsePart>) -> ProcessedResponse {
    let mut pairs = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for part in parts {
        match part {
            ResponsePart::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pending.push(trimmed.to_string());
                }
            }
            ResponsePart::Image(image) => {
                let text = (!pending.is_empty()).then(|| pending.join("\n"));
                pending.clear();
                pairs.push(ImageTextPair { image, text });
            }
        }
    }

    let trailing_text = (!pending.is_empty()).then(|| pending.join("\n"));
    ProcessedResponse {
        pairs,
        trailing_text,
    }
}

impl ProcessedResponse {
    pub fn has_images(&self) -> bool {
        !self.pairs.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = &InlineImage> {
        self.pairs.iter().map(|pair| &pair.image)
    }

    /// No image, and the only text says the model is still working
    pub fn is_wait_notice(&self) -> bool {
        !self.has_images() && self.trailing_text.as_deref().is_some_and(is_wait_notice)
    }

    /// All text in delivery order, joined by newlines
    pub fn text(&self) -> String {
        self.pairs
            .iter()
            .filter_map(|pair| pair.text.as_deref())
            .chain(self.trailing_text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Delivery sequence: text before its image, pairs in order, trailing text last
    pub fn into_replies(self) -> Vec<Reply> {
        let mut replies = Vec::with_capacity(self.pairs.len() * 2 + 1);
        for pair in self.pairs {
            if let Some(text) = pair.text {
                replies.push(Reply::Text(text));
            }
            replies.push(Reply::Image(pair.image));
        }
        if let Some(text) = self.trailing_text {
            replies.push(Reply::Text(text));
        }
        replies
    }
}

pub fn is_wait_notice(text: &str) -> bool {
    let lower = text.to_lowercase();
    WAIT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Turn an upstream refusal into the message shown to the user.
/// Text that is not a recognised refusal is returned unchanged.
pub fn localize_refusal(text: &str) -> String {
    if text.contains("finishReason") {
        let message = if text.contains("IMAGE_SAFETY") {
            "Sorry, your request may violate the content safety policy, so the image could not \
             be generated or edited. Please try a different, safer description."
        } else if text.contains("RECITATION") {
            "Please change the prompt and avoid asking for copied or infringing content."
        } else if text.contains("SAFETY") {
            "The content was blocked by the safety system. Please adjust your prompt."
        } else {
            "Sorry, image processing failed. Please try another description or try again later."
        };
        return message.to_string();
    }

    if text.contains("I'm unable to create this image") {
        let reason = if text.contains("sexually suggestive") {
            " I can't generate sexually suggestive content or content that promotes harmful stereotypes."
        } else if text.contains("harmful") || text.contains("dangerous") {
            " I can't generate content that may be harmful or dangerous."
        } else if text.contains("violent") {
            " I can't generate violent or gory content."
        } else {
            ""
        };
        return format!(
            "Sorry, I can't create this image.{reason} Please try a different description."
        );
    }

    if text.contains("cannot generate") || text.contains("can't generate") {
        return "Sorry, I can't generate an image matching that description. Please try another one."
            .to_string();
    }

    if text.contains("against our content policy") {
        return "Sorry, the request goes against the content policy. Please try another description."
            .to_string();
    }

    text.to_string()
}
