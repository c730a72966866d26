//! Prompt translation side-call
//!
//! Best effort: callers fall back to the original text on any error.

use crate::config::TranslateConfig;
use crate::gemini::redact::redact_body;
use crate::gemini::{HttpRequest, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT: &str = "You are a professional Chinese-English translator. Translate the \
user's prompt into English for AI image generation. Keep the original intent and style. Reply \
with the translation only, without explanations or extra content.";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Transport(String),
    #[error("translation service returned HTTP {status}")]
    Status { status: u16 },
    #[error("translation response unreadable: {0}")]
    Malformed(String),
    #[error("translation came back empty")]
    Empty,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        (**self).translate(text).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` translator
pub struct ChatCompletionsTranslator {
    transport: Arc<dyn Transport>,
    config: TranslateConfig,
}

impl ChatCompletionsTranslator {
    pub fn new(transport: Arc<dyn Transport>, config: TranslateConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl Translator for ChatCompletionsTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Translate the following prompt into English for AI image generation:\n\n{text}"
                    ),
                },
            ],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| TranslateError::Malformed(e.to_string()))?;

        let response = self
            .transport
            .post_json(HttpRequest {
                url: format!("{}/chat/completions", self.config.api_base),
                bearer: Some(self.config.api_key.clone()),
                body,
                timeout: TRANSLATE_TIMEOUT,
            })
            .await
            .map_err(|e| TranslateError::Transport(e.message))?;

        if !response.is_success() {
            tracing::warn!(status = response.status, body = %redact_body(&response.body), "Translation failed");
            return Err(TranslateError::Status {
                status: response.status,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&response.body)
            .map_err(|e| TranslateError::Malformed(e.to_string()))?;
        let translated = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| clean(&content))
            .unwrap_or_default();

        if translated.is_empty() {
            return Err(TranslateError::Empty);
        }
        tracing::info!(original = %text, translated = %translated, "Translated prompt");
        Ok(translated)
    }
}

/// Strip surrounding quotes and whitespace
fn clean(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{chat_completion_body, MockTransport};

    fn translator(transport: Arc<MockTransport>) -> ChatCompletionsTranslator {
        ChatCompletionsTranslator::new(
            transport,
            TranslateConfig {
                enabled: true,
                api_base: "https://api.example/v1".to_string(),
                api_key: "tk".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_translates_and_cleans() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &chat_completion_body("  \"a cat on the moon\" "));
        let result = translator(transport.clone()).translate("月球上的猫").await.unwrap();
        assert_eq!(result, "a cat on the moon");

        let request = &transport.recorded_requests()[0];
        assert_eq!(request.url, "https://api.example/v1/chat/completions");
        assert_eq!(request.bearer.as_deref(), Some("tk"));
        assert_eq!(request.timeout, TRANSLATE_TIMEOUT);
        assert!(request.body.contains("月球上的猫"));
    }

    #[tokio::test]
    async fn test_errors_are_reported() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(500, "oops");
        transport.queue_json(200, &chat_completion_body("   "));
        transport.queue(200, "not json");
        let t = translator(transport);

        assert!(matches!(t.translate("x").await, Err(TranslateError::Status { status: 500 })));
        assert!(matches!(t.translate("x").await, Err(TranslateError::Empty)));
        assert!(matches!(t.translate("x").await, Err(TranslateError::Malformed(_))));
    }
}
