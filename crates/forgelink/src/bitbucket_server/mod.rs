//! Bitbucket Server (Data Center) adapter.
//!
//! Owners are project keys. The server has no labels, deployment
//! environments or code-scanning upload, so those operations return
//! [`ScmError::Unsupported`](crate::ScmError::Unsupported) after validation.

mod client;
pub mod convert;
pub mod error;
mod types;

pub use client::BitbucketServerClient;
pub use convert::KNOWN_EVENTS;
pub use error::{classify, error_message};
