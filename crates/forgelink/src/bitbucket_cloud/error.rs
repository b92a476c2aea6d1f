//! Bitbucket Cloud response classification.

use serde::Deserialize;

use crate::platform::{Op, ScmError, classify_status};

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Classify a non-2xx response. 429 is a retryable rate limit.
pub fn classify(op: &Op, status: u16, body: &str) -> ScmError {
    classify_status(op, status, &error_message(body))
}

/// `{"type": "error", "error": {"message": ...}}`, or the raw body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}
