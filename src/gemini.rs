//! Gemini API gateway
//!
//! Performs one logical generateContent call: builds the request from the
//! conversation history plus the new turn, keeps it under the size limit,
//! retries transient failures with backoff and classifies the outcome.

mod error;
pub mod redact;
mod retry;
#[cfg(test)]
pub mod testing;
mod transport;
mod types;
mod wire;

pub use error::{classify_status, GatewayError};
#[cfg(test)]
use error::GatewayErrorKind;
pub use retry::{BackoffPolicy, CallProfile};
pub use transport::{loggable_url, HttpRequest, HttpResponse, ReqwestTransport, Transport};
#[cfg(test)]
use transport::TransportError;
#[cfg(test)]
pub(crate) use types::test_png;
pub use types::{InlineImage, Message, Part, Role};
pub use wire::GeminiRequest;

use crate::config::{AuthMode, Config};
use crate::response::{decompose, ProcessedResponse};
use crate::session::trimmer::serialized_len;
use crate::session::SessionStore;
use redact::redact_body;
use std::sync::Arc;
use tokio::time::Instant;
use wire::{GeminiErrorResponse, GeminiResponse, REFUSAL_FINISH_REASONS};

/// Largest request body sent upstream
pub const MAX_REQUEST_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub auth_mode: AuthMode,
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            auth_mode: config.auth_mode,
        }
    }
}

/// The new turn of a call
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<InlineImage>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }

    /// The user message this request adds to the conversation
    pub fn turn(&self) -> Message {
        let mut parts = vec![Part::text(self.prompt.clone())];
        parts.extend(self.images.iter().cloned().map(Part::Image));
        Message::new(Role::User, parts)
    }
}

/// Conversation whose history prefixes the request
#[derive(Clone, Copy)]
pub struct History<'a> {
    pub sessions: &'a SessionStore,
    pub key: &'a str,
}

pub struct GeminiGateway {
    transport: Arc<dyn Transport>,
    config: GatewayConfig,
    backoff: BackoffPolicy,
}

impl GeminiGateway {
    pub fn new(transport: Arc<dyn Transport>, config: GatewayConfig) -> Self {
        Self {
            transport,
            config,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.config.auth_mode
    }

    fn endpoint(&self, model: &str) -> (String, Option<String>) {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        match self.config.auth_mode {
            AuthMode::Direct => (format!("{url}?key={}", self.config.api_key), None),
            AuthMode::Proxy => (url, Some(self.config.api_key.clone())),
        }
    }

    /// Run one call. With `history`, the conversation's messages precede the
    /// new turn; if the result would exceed `MAX_REQUEST_SIZE` the history
    /// is dropped and the conversation collapsed to the current prompt.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        profile: CallProfile,
        history: Option<History<'_>>,
    ) -> Result<ProcessedResponse, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.generate_inner(request, profile, history).await;
        let duration = start.elapsed();

        match &result {
            Ok(processed) => {
                tracing::info!(
                    profile = profile.name,
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    images = processed.pairs.len(),
                    trailing_text = processed.trailing_text.is_some(),
                    "Gemini request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    profile = profile.name,
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    status = ?e.status,
                    kind = ?e.kind,
                    "Gemini request failed"
                );
            }
        }
        result
    }

    async fn generate_inner(
        &self,
        request: &GenerateRequest,
        profile: CallProfile,
        history: Option<History<'_>>,
    ) -> Result<ProcessedResponse, GatewayError> {
        let turn = request.turn();
        let mut messages = match history {
            Some(h) => h.sessions.history(h.key).await,
            None => Vec::new(),
        };
        let had_history = !messages.is_empty();
        messages.push(turn.clone());

        if had_history {
            let size = serialized_len(&messages);
            if size > MAX_REQUEST_SIZE {
                tracing::warn!(
                    size,
                    limit = MAX_REQUEST_SIZE,
                    history = messages.len() - 1,
                    "Request too large, dropping conversation history"
                );
                messages = vec![turn];
                if let Some(h) = history {
                    h.sessions
                        .collapse_to_prompt(h.key, &request.prompt, Instant::now())
                        .await;
                }
            }
        }

        let body = encode(&messages, profile)?;
        if body.len() > MAX_REQUEST_SIZE {
            tracing::warn!(size = body.len(), "Request still above size limit, sending as is");
        }

        let (url, bearer) = self.endpoint(&request.model);
        let http_request = HttpRequest {
            url,
            bearer,
            body,
            timeout: profile.timeout,
        };
        tracing::debug!(
            url = %loggable_url(&http_request.url),
            body = %redact_body(&http_request.body),
            "Sending Gemini request"
        );

        let response_body = self.send_with_retry(http_request, profile).await?;
        parse_response(&response_body)
    }

    async fn send_with_retry(
        &self,
        request: HttpRequest,
        profile: CallProfile,
    ) -> Result<String, GatewayError> {
        let mut attempt = 0;
        loop {
            let error = match self.transport.post_json(request.clone()).await {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        tracing::info!(profile = profile.name, attempt = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(response.body);
                }
                Ok(response) => status_error(&response, profile),
                Err(e) => GatewayError::transient(e.message),
            };

            if !error.kind.is_retryable() || attempt + 1 >= profile.attempts() {
                if error.kind.is_retryable() {
                    tracing::error!(profile = profile.name, attempts = attempt + 1, "Retry budget exhausted");
                }
                return Err(error);
            }

            let delay = self.backoff.delay_for(attempt);
            attempt += 1;
            tracing::warn!(
                profile = profile.name,
                status = ?error.status,
                error = %error.message,
                retry = attempt,
                max_retries = profile.max_retries,
                delay_ms = %delay.as_millis(),
                "Transient upstream failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn encode(messages: &[Message], profile: CallProfile) -> Result<String, GatewayError> {
    serde_json::to_string(&GeminiRequest::new(messages, profile.with_images))
        .map_err(|e| GatewayError::upstream(format!("Failed to encode request: {e}")))
}

fn status_error(response: &HttpResponse, profile: CallProfile) -> GatewayError {
    let kind = classify_status(response.status, profile.retry_forbidden);
    let detail = serde_json::from_str::<GeminiErrorResponse>(&response.body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| redact_body(&response.body));
    if response.status == 400 {
        tracing::error!(body = %redact_body(&response.body), "Upstream rejected request");
    }
    GatewayError::new(kind, format!("HTTP {}: {detail}", response.status)).with_status(response.status)
}

fn parse_response(body: &str) -> Result<ProcessedResponse, GatewayError> {
    if body.trim().is_empty() {
        return Err(GatewayError::malformed("Empty response body"));
    }
    let response: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, body = %redact_body(body), "Unreadable Gemini response");
        GatewayError::malformed(format!("Failed to parse response: {e}"))
    })?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            tracing::warn!(block_reason = %reason, "Prompt blocked upstream");
            return Err(GatewayError::content_policy(format!(
                "Prompt blocked (finishReason: {reason})"
            )));
        }
        return Err(GatewayError::malformed("Response has no candidates"));
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if REFUSAL_FINISH_REASONS.contains(&reason) {
            let text = candidate.text();
            tracing::warn!(finish_reason = %reason, text = %text, "Generation refused");
            return Err(GatewayError::content_policy(format!(
                "finishReason: {reason}. {text}"
            )));
        }
    }

    Ok(decompose(candidate.decode_parts()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionKind;
    use serde_json::json;
    use std::time::Duration;
    use testing::{image_body, text_body, MockTransport};

    fn gateway(transport: Arc<MockTransport>, auth_mode: AuthMode) -> GeminiGateway {
        GeminiGateway::new(
            transport,
            GatewayConfig {
                base_url: "https://gemini.test".to_string(),
                api_key: "secret".to_string(),
                auth_mode,
            },
        )
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new("image-model", "a red fox")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..3 {
            transport.queue(503, r#"{"error":{"message":"overloaded"}}"#);
        }
        transport.queue_json(200, &image_body("here you go", &[1, 2, 3]));
        let gw = gateway(transport.clone(), AuthMode::Direct);

        let start = Instant::now();
        let processed = gw.generate(&request(), CallProfile::edit(5), None).await.unwrap();

        assert_eq!(transport.request_count(), 4);
        assert_eq!(processed.pairs.len(), 1);
        assert_eq!(processed.pairs[0].text.as_deref(), Some("here you go"));
        // 1s + 1.5s + 2.25s of backoff
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(4750), "waited {waited:?}");
        assert!(waited < Duration::from_millis(4800), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_transient_exhausts_budget() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..20 {
            transport.queue(503, "busy");
        }
        let gw = gateway(transport.clone(), AuthMode::Direct);

        let err = gw.generate(&request(), CallProfile::edit(5), None).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Transient);
        assert_eq!(err.status, Some(503));
        assert_eq!(transport.request_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(TransportError::timeout("Request timeout"));
        transport.queue_json(200, &text_body("fine"));
        let gw = gateway(transport.clone(), AuthMode::Direct);

        let processed = gw.generate(&request(), CallProfile::text(2), None).await.unwrap();
        assert_eq!(processed.text(), "fine");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_retried_only_for_merge() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(403, "denied");
        transport.queue_json(200, &image_body("merged", &[9]));
        let gw = gateway(transport.clone(), AuthMode::Direct);
        assert!(gw.generate(&request(), CallProfile::merge(10), None).await.is_ok());
        assert_eq!(transport.request_count(), 2);

        let transport = Arc::new(MockTransport::new());
        transport.queue(403, "denied");
        let gw = gateway(transport.clone(), AuthMode::Direct);
        let err = gw.generate(&request(), CallProfile::edit(5), None).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Auth);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_statuses_are_not_retried() {
        for (status, kind) in [
            (400, GatewayErrorKind::BadRequest),
            (401, GatewayErrorKind::Auth),
            (404, GatewayErrorKind::Upstream),
        ] {
            let transport = Arc::new(MockTransport::new());
            transport.queue_json(status, &json!({"error": {"message": "nope", "code": status}}));
            let gw = gateway(transport.clone(), AuthMode::Direct);
            let err = gw.generate(&request(), CallProfile::generate(5), None).await.unwrap_err();
            assert_eq!(err.kind, kind);
            assert!(err.message.contains("nope"));
            assert_eq!(transport.request_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_safety_finish_reason_is_refusal() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(
            200,
            &json!({"candidates": [{"finishReason": "IMAGE_SAFETY", "content": {"parts": []}}]}),
        );
        let gw = gateway(transport.clone(), AuthMode::Direct);
        let err = gw.generate(&request(), CallProfile::generate(5), None).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::ContentPolicy);
        assert_eq!(transport.request_count(), 1);
        assert!(err.user_message(AuthMode::Direct).contains("content safety policy"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_refusal() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let gw = gateway(transport, AuthMode::Direct);
        let err = gw.generate(&request(), CallProfile::generate(5), None).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::ContentPolicy);
    }

    #[tokio::test]
    async fn test_malformed_bodies() {
        for body in ["", "<html>bad gateway</html>", r#"{"candidates": []}"#] {
            let transport = Arc::new(MockTransport::new());
            transport.queue(200, body);
            let gw = gateway(transport, AuthMode::Proxy);
            let err = gw.generate(&request(), CallProfile::generate(5), None).await.unwrap_err();
            assert_eq!(err.kind, GatewayErrorKind::Malformed, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_auth_modes() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &text_body("ok"));
        transport.queue_json(200, &text_body("ok"));

        gateway(transport.clone(), AuthMode::Direct)
            .generate(&request(), CallProfile::generate(0), None)
            .await
            .unwrap();
        gateway(transport.clone(), AuthMode::Proxy)
            .generate(&request(), CallProfile::generate(0), None)
            .await
            .unwrap();

        let requests = transport.recorded_requests();
        assert_eq!(
            requests[0].url,
            "https://gemini.test/v1beta/models/image-model:generateContent?key=secret"
        );
        assert!(requests[0].bearer.is_none());
        assert_eq!(
            requests[1].url,
            "https://gemini.test/v1beta/models/image-model:generateContent"
        );
        assert_eq!(requests[1].bearer.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_history_precedes_new_turn() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &text_body("ok"));
        let sessions = SessionStore::new(Duration::from_secs(180));
        let now = Instant::now();
        sessions.append("u", Role::User, vec![Part::text("earlier")], now).await;
        sessions.append("u", Role::Model, vec![Part::text("reply")], now).await;

        gateway(transport.clone(), AuthMode::Direct)
            .generate(
                &request(),
                CallProfile::generate(0),
                Some(History { sessions: &sessions, key: "u" }),
            )
            .await
            .unwrap();

        let body = &transport.recorded_bodies()[0];
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2]["parts"][0]["text"], "a red fox");
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["Text", "Image"]));
    }

    #[tokio::test]
    async fn test_oversize_history_is_collapsed() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &image_body("done", &[5, 5]));
        let sessions = SessionStore::new(Duration::from_secs(180));
        let now = Instant::now();
        sessions.create_or_reset("u", SessionKind::Edit, false, now).await;
        let id = sessions.get("u").await.unwrap().conversation_id;
        sessions
            .append(
                "u",
                Role::Model,
                vec![Part::text("big"), Part::Image(test_png(3_500_000))],
                now,
            )
            .await;

        let result = gateway(transport.clone(), AuthMode::Direct)
            .generate(
                &request(),
                CallProfile::edit(5),
                Some(History { sessions: &sessions, key: "u" }),
            )
            .await;
        assert!(result.is_ok());

        let sent = &transport.recorded_requests()[0];
        assert!(sent.body.len() <= MAX_REQUEST_SIZE);
        let body: serde_json::Value = serde_json::from_str(&sent.body).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);

        let record = sessions.get("u").await.unwrap();
        assert_eq!(record.messages, vec![Message::user_text("a red fox")]);
        assert_eq!(record.conversation_id, id);
    }
}
