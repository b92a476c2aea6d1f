//! Provider-agnostic contract for source-control hosting clients.
//!
//! This module defines the [`ScmClient`] trait, the normalized data model it
//! speaks, the [`ScmError`] taxonomy, and the factory that turns a
//! [`ConnectionConfig`] into a concrete adapter.
//!
//! # Example
//!
//! ```ignore
//! use forgelink::platform::{ConnectionConfig, ProviderKind, create_client};
//! use forgelink::CallContext;
//!
//! let config = ConnectionConfig::new(ProviderKind::GitHub, token);
//! let client = create_client(&config)?;
//! let repos = client.list_repositories(&CallContext::new()).await?;
//! for (owner, names) in repos {
//!     println!("{owner}: {}", names.join(", "));
//! }
//! ```

mod convert;
mod errors;
mod factory;
mod types;
mod validate;

pub use convert::{add_owner_repos, dedup_first_seen, from_epoch_millis, parse_timestamp};
pub use errors::{Capability, Op, Result, ScmError, classify_status, short_error_message};
pub(crate) use errors::short_body;
pub use factory::{create_client, create_client_with_policy, create_client_with_transport};
pub use types::{
    CommentInfo, CommitInfo, CommitStatus, CommitStatusInfo, ConnectionConfig, EnvironmentInfo,
    LabelInfo, NewCommitStatus, NewPullRequest, Permission, ProviderKind, PullRequestInfo,
    PullRequestState, RepositoryInfo, RepositoryListing, ScmClient, Visibility, WebhookEvent,
    WebhookHandle,
};
pub use validate::{normalize_color, parse_numeric_id, require};
