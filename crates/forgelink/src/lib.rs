//! Forgelink - one client contract over GitHub, GitLab, Bitbucket Server and
//! Bitbucket Cloud.
//!
//! Callers program against [`ScmClient`]; the adapter behind it maps the
//! normalized vocabulary (commit states, webhook events, visibility, deploy
//! key permissions) to the provider's own, walks pagination, and retries
//! rate-limited requests.
//!
//! # Features
//!
//! - `github`, `gitlab`, `bitbucket-server`, `bitbucket-cloud` - one per
//!   provider adapter. All are enabled by default.
//!
//! # Example
//!
//! ```ignore
//! use forgelink::{CallContext, CommitStatus, ConnectionConfig, NewCommitStatus, ProviderKind};
//!
//! let client = forgelink::create_client(&ConnectionConfig::new(ProviderKind::GitLab, token))?;
//! let ctx = CallContext::new().with_timeout(std::time::Duration::from_secs(30));
//!
//! client
//!     .set_commit_status(&ctx, "acme", "widgets", sha, &NewCommitStatus {
//!         state: CommitStatus::InProgress,
//!         context: "ci/build".into(),
//!         description: "building".into(),
//!         target_url: None,
//!     })
//!     .await?;
//! ```

pub mod archive;
pub mod context;
pub mod http;
pub mod pagination;
pub mod platform;
pub mod rest;
pub mod retry;
pub mod secret;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "gitlab")]
pub mod gitlab;

#[cfg(feature = "bitbucket-server")]
pub mod bitbucket_server;

#[cfg(feature = "bitbucket-cloud")]
pub mod bitbucket_cloud;

pub use archive::{ArchiveExtractor, RemoteMarker, TarGzExtractor};
pub use context::CallContext;
pub use platform::{
    Capability, CommentInfo, CommitInfo, CommitStatus, CommitStatusInfo, ConnectionConfig,
    EnvironmentInfo, LabelInfo, NewCommitStatus, NewPullRequest, Permission, ProviderKind,
    PullRequestInfo, PullRequestState, RepositoryInfo, RepositoryListing, ScmClient, ScmError,
    Visibility, WebhookEvent, WebhookHandle, create_client, create_client_with_policy,
    create_client_with_transport,
};
pub use retry::RetryPolicy;
