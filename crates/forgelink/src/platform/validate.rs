//! Local, synchronous parameter checks run before any remote call.

use super::errors::{Result, ScmError};

/// Check that every named parameter is non-blank.
///
/// Returns a single [`ScmError::MissingParameters`] listing every blank
/// parameter in the order given, not just the first.
///
/// ```
/// use forgelink::platform::require;
///
/// let err = require(&[("owner", ""), ("repository", " "), ("sha", "abc")]).unwrap_err();
/// assert_eq!(err.to_string(), "missing required parameters: owner, repository");
/// ```
pub fn require(params: &[(&'static str, &str)]) -> Result<()> {
    let names: Vec<&'static str> = params
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if names.is_empty() {
        Ok(())
    } else {
        Err(ScmError::MissingParameters { names })
    }
}

/// Parse a caller-supplied identifier as the numeric id a provider expects.
pub fn parse_numeric_id(name: &'static str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ScmError::invalid(name, format!("{value:?} is not a numeric id: {e}")))
}

/// Normalize a label color to six lowercase hex digits without a leading `#`.
pub fn normalize_color(color: &str) -> Result<String> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hex.to_ascii_lowercase())
    } else {
        Err(ScmError::invalid(
            "color",
            format!("{color:?} is not a 6-digit hex color"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_passes_when_all_present() {
        assert!(require(&[("owner", "acme"), ("repository", "widgets")]).is_ok());
        assert!(require(&[]).is_ok());
    }

    #[test]
    fn require_lists_every_missing_parameter() {
        let err = require(&[("owner", ""), ("repository", "")]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("owner"));
        assert!(msg.contains("repository"));
        match err {
            ScmError::MissingParameters { names } => assert_eq!(names, vec!["owner", "repository"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn require_treats_whitespace_as_blank() {
        let err = require(&[("owner", "acme"), ("sha", "\t ")]).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameters: sha");
    }

    #[test]
    fn parse_numeric_id_rejects_garbage() {
        assert_eq!(parse_numeric_id("webhook id", "42").unwrap(), 42);
        assert_eq!(parse_numeric_id("webhook id", " 7 ").unwrap(), 7);

        let err = parse_numeric_id("webhook id", "abc").unwrap_err();
        assert!(matches!(
            err,
            ScmError::InvalidArgument {
                name: "webhook id",
                ..
            }
        ));
        assert!(err.is_local());
    }

    #[test]
    fn normalize_color_accepts_with_and_without_hash() {
        assert_eq!(normalize_color("#FF00aa").unwrap(), "ff00aa");
        assert_eq!(normalize_color("00ff00").unwrap(), "00ff00");
        assert!(normalize_color("fff").is_err());
        assert!(normalize_color("gggggg").is_err());
    }
}
