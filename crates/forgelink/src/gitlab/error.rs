//! GitLab response classification.

use crate::platform::{Op, ScmError, classify_status};

/// Classify a non-2xx GitLab response. 429 is a (retryable) rate limit.
pub fn classify(op: &Op, status: u16, body: &str) -> ScmError {
    classify_status(op, status, &error_message(body))
}

/// Pull the human-readable message out of a GitLab error body.
///
/// GitLab answers with `{"message": ...}` for most failures (the message may
/// itself be an object of field errors) and `{"error": ...}` for auth and
/// parameter errors. Anything else is returned as-is.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    match value.get("message").or_else(|| value.get("error")) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}
