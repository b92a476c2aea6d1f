use chrono::{DateTime, Utc};

use super::errors::{Op, Result};
use super::types::RepositoryListing;

/// Keep the first occurrence of each item, preserving order.
///
/// Used for webhook event lists, where several normalized events fold into
/// one provider event.
pub fn dedup_first_seen<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Parse an RFC 3339 timestamp from a provider response.
pub fn parse_timestamp(op: &Op, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| op.decode(format!("invalid timestamp {value:?}: {e}")))
}

/// Convert epoch milliseconds (Bitbucket Server) to a UTC timestamp.
pub fn from_epoch_millis(op: &Op, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| op.decode(format!("timestamp {millis} out of range")))
}

/// Insert an owner's repositories into a listing, leaving owners without
/// repositories out entirely.
pub fn add_owner_repos(listing: &mut RepositoryListing, owner: &str, repos: Vec<String>) {
    if !repos.is_empty() {
        listing.entry(owner.to_string()).or_default().extend(repos);
    }
}
