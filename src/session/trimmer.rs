//! History bounds

use crate::gemini::{GeminiRequest, Message};

/// Upper bound on messages kept per conversation
pub const MAX_MESSAGES: usize = 10;

/// Drop the oldest messages beyond `max`. Returns how many were dropped.
pub fn trim_to(messages: &mut Vec<Message>, max: usize) -> usize {
    let excess = messages.len().saturating_sub(max);
    if excess > 0 {
        messages.drain(..excess);
    }
    excess
}

/// Size in bytes of the request body these messages serialize to
pub fn serialized_len(messages: &[Message]) -> usize {
    serde_json::to_vec(&GeminiRequest::new(messages, true)).map_or(0, |body| body.len())
}
