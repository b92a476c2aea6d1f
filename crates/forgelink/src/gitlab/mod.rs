//! GitLab adapter.
//!
//! Projects are addressed by their URL-encoded `namespace/path`, so owners
//! may be nested groups (`acme/platform`).

mod client;
pub mod convert;
pub mod error;
mod types;

pub use client::GitLabClient;
pub use convert::KNOWN_EVENTS;
pub use error::{classify, error_message};
