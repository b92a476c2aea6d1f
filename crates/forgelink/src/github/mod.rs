//! GitHub adapter.
//!
//! Talks to the GitHub REST API (github.com or GitHub Enterprise Server).
//! GitHub is the only provider with SARIF code-scanning upload.
//!
//! # Module Structure
//!
//! - [`error`] - Response classification, including the rate-limit body heuristic
//! - `types` - Wire types for the endpoints the adapter uses
//! - `client` - The [`GitHubClient`] implementation of [`ScmClient`](crate::ScmClient)
//! - [`convert`] - Vocabulary mapping and model conversion

mod client;
pub mod convert;
pub mod error;
mod types;

pub use client::GitHubClient;
pub use convert::KNOWN_EVENTS;
pub use error::{classify, is_secondary_rate_limit, mentions_rate_limit};
