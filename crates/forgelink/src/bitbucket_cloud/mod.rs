//! Bitbucket Cloud adapter.
//!
//! Owners are workspace slugs and webhook ids are UUIDs. Cloud has no
//! labels or code-scanning upload, and its access keys cannot push.

mod client;
pub mod convert;
pub mod error;
mod types;

pub use client::BitbucketCloudClient;
pub use convert::KNOWN_EVENTS;
pub use error::{classify, error_message};
