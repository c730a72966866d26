//! API request and response types

use crate::engine::IntentKind;
use crate::response::Reply;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// One parsed command from a chat front end
#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub user: String,
    /// Group chat the message came from; omitted for private chats
    #[serde(default)]
    pub session: Option<String>,
    pub kind: IntentKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_base64: Option<String>,
}

/// A single reply, in the order the engine sent it
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyBody {
    Text { text: String },
    Image { mime_type: String, data: String },
}

impl From<Reply> for ReplyBody {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Text(text) => ReplyBody::Text { text },
            Reply::Image(image) => ReplyBody::Image {
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                mime_type: image.mime_type,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub replies: Vec<ReplyBody>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub api_key_configured: bool,
    pub conversations: usize,
    pub cached_images: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
