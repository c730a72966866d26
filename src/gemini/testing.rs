//! Scripted transport for tests

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock transport that replays queued responses and records requests.
/// An empty queue answers 503.
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.into(),
        }));
    }

    pub fn queue_json(&self, status: u16, body: &Value) {
        self.queue(status, body.to_string());
    }

    pub fn queue_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request bodies parsed back into JSON
    pub fn recorded_bodies(&self) -> Vec<Value> {
        self.recorded_requests()
            .iter()
            .map(|r| serde_json::from_str(&r.body).unwrap())
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 503,
                    body: r#"{"error":{"message":"no scripted response"}}"#.to_string(),
                })
            })
    }
}

// ============================================================================
// Response builders
// ============================================================================

/// A successful generateContent body; `None` entries are text, `Some` images.
pub fn gemini_body(parts: &[(Option<&str>, Option<&[u8]>)]) -> Value {
    let parts: Vec<Value> = parts
        .iter()
        .map(|(text, image)| match (text, image) {
            (_, Some(bytes)) => json!({"inlineData": {"mimeType": "image/png", "data": BASE64.encode(bytes)}}),
            (Some(text), None) => json!({"text": text}),
            (None, None) => json!({}),
        })
        .collect();
    json!({"candidates": [{"content": {"role": "model", "parts": parts}, "finishReason": "STOP"}]})
}

pub fn text_body(text: &str) -> Value {
    gemini_body(&[(Some(text), None)])
}

pub fn image_body(caption: &str, image: &[u8]) -> Value {
    gemini_body(&[(Some(caption), None), (None, Some(image))])
}

pub fn chat_completion_body(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}
