//! GitHub response classification.

use crate::platform::{Op, ScmError, short_body};

/// Classify a non-2xx GitHub response.
///
/// GitHub reports both primary and secondary rate limits as 403 (sometimes
/// 429) with an explanatory body, so status alone is not enough: a 403 or
/// 429 is only a rate limit when the body says so. A 422 on a commit lookup
/// is handled by the caller, not here.
pub fn classify(op: &Op, status: u16, body: &str) -> ScmError {
    match status {
        404 => op.not_found(),
        403 | 429 if mentions_rate_limit(body) => {
            op.rate_limited(short_body(body), is_secondary_rate_limit(body))
        }
        _ => op.remote(status, short_body(body)),
    }
}

/// Whether a response body describes a rate limit.
pub fn mentions_rate_limit(body: &str) -> bool {
    body.to_ascii_lowercase().contains("rate limit")
}

/// Whether a rate-limit body describes a secondary (abuse) limit.
pub fn is_secondary_rate_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("secondary rate limit") || lower.contains("abuse")
}
