//! HTTP transport abstraction
//!
//! The gateway and the translator post JSON through this trait so retry and
//! classification logic can be exercised against a scripted mock.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A JSON POST
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer: Option<String>,
    pub body: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a status line
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).post_json(request).await
    }
}

/// `reqwest` backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| TransportError::new(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .timeout(request.timeout)
            .body(request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        // without_url(): the URL carries the API key in direct mode
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(format!("Request timeout: {}", e.without_url()))
            } else if e.is_connect() {
                TransportError::new(format!("Connection failed: {}", e.without_url()))
            } else {
                TransportError::new(format!("Request failed: {}", e.without_url()))
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(format!("Response timeout: {}", e.without_url()))
            } else {
                TransportError::new(format!("Failed to read response: {}", e.without_url()))
            }
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Remove the `key` query parameter from a URL before logging it.
pub fn loggable_url(url: &str) -> String {
    match url.split_once('?') {
        None => url.to_string(),
        Some((base, query)) => {
            let kept: Vec<&str> = query
                .split('&')
                .filter(|pair| !pair.starts_with("key="))
                .collect();
            if kept.is_empty() {
                base.to_string()
            } else {
                format!("{base}?{}", kept.join("&"))
            }
        }
    }
}
