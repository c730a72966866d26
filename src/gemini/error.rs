//! Gateway error types

use crate::config::AuthMode;
use thiserror::Error;

/// Gateway error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    /// HTTP status of the terminal response, if one was received
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transient, message)
    }

    pub fn content_policy(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::ContentPolicy, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Malformed, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Upstream, message)
    }

    /// Text shown to the chat user for this failure
    pub fn user_message(&self, auth_mode: AuthMode) -> String {
        match self.kind {
            GatewayErrorKind::Transient => {
                "The image service is busy right now. Please try again later.".to_string()
            }
            GatewayErrorKind::Auth => {
                "API call failed: please check the API key or proxy service configuration."
                    .to_string()
            }
            GatewayErrorKind::BadRequest => {
                "API call failed: the request was rejected. Please adjust the prompt and try again."
                    .to_string()
            }
            GatewayErrorKind::ContentPolicy => crate::response::localize_refusal(&self.message),
            GatewayErrorKind::Malformed => match auth_mode {
                AuthMode::Proxy => "The API response could not be read. This is usually a proxy \
                                    service problem: check the proxy implementation or disable it."
                    .to_string(),
                AuthMode::Direct => {
                    "The API response could not be read. Please try again later.".to_string()
                }
            },
            GatewayErrorKind::Upstream => {
                "API call failed: please check the network connection or proxy configuration."
                    .to_string()
            }
        }
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// 429/5xx or transport failure - retryable; terminal only once the
    /// attempt budget is exhausted
    Transient,
    /// 401, or 403 outside the merge retry set - not retryable
    Auth,
    /// 400 - not retryable
    BadRequest,
    /// Safety/recitation finish reason or blocked prompt - never retried
    ContentPolicy,
    /// Body not decodable as a generateContent response
    Malformed,
    /// Any other non-success status
    Upstream,
}

impl GatewayErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Classify a non-success HTTP status.
///
/// `retry_forbidden` makes 403 transient, which only the merge flow wants.
pub fn classify_status(status: u16, retry_forbidden: bool) -> GatewayErrorKind {
    match status {
        429 | 500 | 502 | 503 | 504 => GatewayErrorKind::Transient,
        403 if retry_forbidden => GatewayErrorKind::Transient,
        401 | 403 => GatewayErrorKind::Auth,
        400 => GatewayErrorKind::BadRequest,
        _ => GatewayErrorKind::Upstream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert_eq!(classify_status(status, false), GatewayErrorKind::Transient);
        }
    }

    #[test]
    fn test_forbidden_depends_on_profile() {
        assert_eq!(classify_status(403, false), GatewayErrorKind::Auth);
        assert_eq!(classify_status(403, true), GatewayErrorKind::Transient);
        assert_eq!(classify_status(401, true), GatewayErrorKind::Auth);
    }

    #[test]
    fn test_terminal_statuses() {
        assert_eq!(classify_status(400, true), GatewayErrorKind::BadRequest);
        assert_eq!(classify_status(404, false), GatewayErrorKind::Upstream);
        assert!(!GatewayErrorKind::BadRequest.is_retryable());
    }

    #[test]
    fn test_malformed_hint_only_in_proxy_mode() {
        let err = GatewayError::malformed("bad json");
        assert!(err.user_message(AuthMode::Proxy).contains("proxy"));
        assert!(!err.user_message(AuthMode::Direct).contains("proxy"));
    }
}
