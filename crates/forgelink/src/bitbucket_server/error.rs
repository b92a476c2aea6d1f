//! Bitbucket Server response classification.

use serde::Deserialize;

use crate::platform::{Op, ScmError, classify_status};

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    message: String,
}

/// Classify a non-2xx response. 429 is a retryable rate limit.
pub fn classify(op: &Op, status: u16, body: &str) -> ScmError {
    classify_status(op, status, &error_message(body))
}

/// Join the `errors[].message` entries, or return the raw body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let body = r#"{"errors":[{"context":null,"message":"Repository widgets does not exist.","exceptionName":"NoSuchRepositoryException"}]}"#;
        assert_eq!(error_message(body), "Repository widgets does not exist.");
        assert_eq!(
            error_message(r#"{"errors":[{"message":"a"},{"message":"b"}]}"#),
            "a; b"
        );
        assert_eq!(error_message("<html>busy</html>"), "<html>busy</html>");
    }

    #[test]
    fn test_classify() {
        let op = Op::repo("get commit", "PRJ", "widgets");
        assert!(classify(&op, 404, "{}").is_not_found());
        assert!(classify(&op, 429, "").is_rate_limited());
        assert!(matches!(
            classify(&op, 409, r#"{"errors":[{"message":"conflict"}]}"#),
            ScmError::Remote { status: 409, .. }
        ));
    }
}
