//! Log redaction for request/response payloads
//!
//! Inline image data is base64 and routinely megabytes long. Logged payloads
//! keep only a short prefix plus the length.

use serde_json::Value;

const MIN_REDACT_LEN: usize = 100;
const KEPT_PREFIX: usize = 20;

/// Replace base64-looking strings with a length marker, recursively.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), redact_json(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::String(s) if is_likely_base64(s) => Value::String(elide(s)),
        other => other.clone(),
    }
}

/// Redact a raw body for logging. Non-JSON bodies are cut to a prefix.
pub fn redact_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => redact_json(&value).to_string(),
        Err(_) if body.chars().count() > 500 => {
            let prefix: String = body.chars().take(500).collect();
            format!("{prefix}... [len: {}]", body.len())
        }
        Err(_) => body.to_string(),
    }
}

fn elide(s: &str) -> String {
    let prefix: String = s.chars().take(KEPT_PREFIX).collect();
    format!("{prefix}... [len: {}]", s.len())
}

/// Long strings made almost entirely of base64 alphabet characters
pub fn is_likely_base64(s: &str) -> bool {
    if s.len() <= MIN_REDACT_LEN {
        return false;
    }
    let foreign = s
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')))
        .count();
    // Allow a few stray characters such as line breaks
    foreign * 20 < s.len()
}
