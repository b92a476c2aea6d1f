use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveExtractor;
use crate::context::CallContext;

use super::errors::Result;

/// A supported source-control hosting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
    BitbucketServer,
    BitbucketCloud,
}

impl ProviderKind {
    /// Default API root for hosted instances, if the provider has one.
    pub fn default_api_url(self) -> Option<&'static str> {
        match self {
            ProviderKind::GitHub => Some("https://api.github.com"),
            ProviderKind::GitLab => Some("https://gitlab.com/api/v4"),
            ProviderKind::BitbucketServer => None,
            ProviderKind::BitbucketCloud => Some("https://api.bitbucket.org/2.0"),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::GitHub => write!(f, "GitHub"),
            ProviderKind::GitLab => write!(f, "GitLab"),
            ProviderKind::BitbucketServer => write!(f, "Bitbucket Server"),
            ProviderKind::BitbucketCloud => write!(f, "Bitbucket Cloud"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            "bitbucket-server" | "bitbucketserver" => Ok(ProviderKind::BitbucketServer),
            "bitbucket-cloud" | "bitbucketcloud" | "bitbucket" => Ok(ProviderKind::BitbucketCloud),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Connection descriptor shared by every adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Which provider to talk to.
    pub provider: ProviderKind,
    /// API root, e.g. `https://api.github.com` or `https://git.example.com`
    /// (Bitbucket Server). Falls back to [`ProviderKind::default_api_url`].
    #[serde(default)]
    pub api_url: Option<String>,
    /// Access token (personal access token, app password, ...).
    pub token: String,
    /// Username for HTTP Basic auth (Bitbucket app passwords).
    #[serde(default)]
    pub username: Option<String>,
    /// Restrict repository listing to a single owner, group, project or workspace.
    #[serde(default)]
    pub scope: Option<String>,
}

impl ConnectionConfig {
    pub fn new(provider: ProviderKind, token: impl Into<String>) -> Self {
        Self {
            provider,
            api_url: None,
            token: token.into(),
            username: None,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// The API root with trailing slashes removed.
    pub fn resolved_api_url(&self) -> Result<String> {
        let url = self
            .api_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.provider.default_api_url())
            .ok_or_else(|| {
                super::ScmError::config(format!("{} requires an API url", self.provider))
            })?;
        Ok(url.trim_end_matches('/').to_string())
    }
}

/// Commit status, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Pass,
    Fail,
    Error,
    InProgress,
}

impl CommitStatus {
    pub const ALL: [CommitStatus; 4] = [
        CommitStatus::Pass,
        CommitStatus::Fail,
        CommitStatus::Error,
        CommitStatus::InProgress,
    ];
}

/// Access level for deploy keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    ReadWrite,
}

/// Repository visibility levels (normalized across platforms).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    /// GitHub Enterprise / GitLab: visible to authenticated users of the instance.
    Internal,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Webhook trigger, normalized across providers.
///
/// No provider models the whole set. Adapters fold events into a broader
/// provider event or drop them; they never fail on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum WebhookEvent {
    PrOpened,
    PrEdited,
    PrMerged,
    PrRejected,
    PrCommented,
    Push,
    TagPushed,
    TagRemoved,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 8] = [
        WebhookEvent::PrOpened,
        WebhookEvent::PrEdited,
        WebhookEvent::PrMerged,
        WebhookEvent::PrRejected,
        WebhookEvent::PrCommented,
        WebhookEvent::Push,
        WebhookEvent::TagPushed,
        WebhookEvent::TagRemoved,
    ];
}

/// Pull request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Merged,
    /// Closed without merging (declined, rejected, superseded).
    Closed,
}

/// A single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub url: String,
    /// Unix timestamp (seconds) of the commit.
    pub timestamp: i64,
    pub message: String,
    pub parents: Vec<String>,
}

/// A pull (merge) request with fully resolved source and target ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestInfo {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub author: String,
    pub source_branch: String,
    pub source_repo: String,
    pub source_owner: String,
    pub target_branch: String,
    pub target_repo: String,
    pub target_owner: String,
    pub state: PullRequestState,
}

/// Request to open a pull request.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub source_branch: String,
    pub target_branch: String,
}

/// A pull request comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentInfo {
    pub id: String,
    /// Thread the comment belongs to, for threaded review discussions.
    pub thread_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Provider revision counter, where the provider versions comments.
    pub version: Option<u64>,
}

/// A repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelInfo {
    pub name: String,
    pub description: String,
    /// Six hex digits, no leading `#`.
    pub color: String,
}

/// Clone URLs and visibility of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryInfo {
    pub http_clone_url: String,
    pub ssh_clone_url: String,
    pub visibility: Visibility,
}

/// A webhook registered by this client.
///
/// The token is generated locally, never by the provider, and is the only
/// credential the receiver has for validating inbound deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookHandle {
    pub id: String,
    pub token: String,
}

/// Status to write against a commit.
#[derive(Debug, Clone)]
pub struct NewCommitStatus {
    pub state: CommitStatus,
    /// Identifies the check (GitHub `context`, GitLab `name`, Bitbucket `key`).
    pub context: String,
    pub description: String,
    pub target_url: Option<String>,
}

/// A status reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatusInfo {
    pub state: CommitStatus,
    pub context: String,
    pub description: String,
    pub target_url: Option<String>,
}

/// A deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentInfo {
    pub name: String,
    pub url: Option<String>,
}

/// Repositories grouped by owner. Owners without repositories are absent;
/// each list keeps provider return order.
pub type RepositoryListing = BTreeMap<String, Vec<String>>;

/// Unified repository-management contract implemented by every provider adapter.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Validate required identifiers with [`require`](super::require) before any remote call
/// - Return [`ScmError::Unsupported`](super::ScmError::Unsupported) immediately for missing capabilities
/// - Route every request through the client's [`RetryPolicy`](crate::retry::RetryPolicy)
/// - Handle pagination internally for list operations
/// - Map HTTP 404 on lookups to [`ScmError::NotFound`](super::ScmError::NotFound)
#[async_trait]
pub trait ScmClient: Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> ProviderKind;

    /// One lightweight authenticated call; an error means not connected.
    async fn test_connection(&self, ctx: &CallContext) -> Result<()>;

    /// Every accessible repository, grouped by owner.
    async fn list_repositories(&self, ctx: &CallContext) -> Result<RepositoryListing>;

    /// Branch names in provider order.
    async fn list_branches(&self, ctx: &CallContext, owner: &str, repo: &str)
    -> Result<Vec<String>>;

    /// Clone URLs and visibility.
    async fn get_repository_info(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo>;

    /// Create a repository under `owner`.
    async fn create_repository(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        visibility: Visibility,
    ) -> Result<RepositoryInfo>;

    /// Register a webhook and return its provider id with a freshly generated secret.
    async fn create_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        url: &str,
        events: &[WebhookEvent],
    ) -> Result<WebhookHandle>;

    /// Replace a webhook's url and events, rotating its secret.
    async fn update_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: &str,
        url: &str,
        events: &[WebhookEvent],
    ) -> Result<WebhookHandle>;

    async fn delete_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: &str,
    ) -> Result<()>;

    async fn set_commit_status(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &NewCommitStatus,
    ) -> Result<()>;

    /// Every status reported against `sha`, in provider order.
    async fn get_commit_statuses(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<CommitStatusInfo>>;

    /// Look up a commit; an unknown sha is [`ScmError::NotFound`](super::ScmError::NotFound).
    async fn get_commit(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitInfo>;

    async fn create_pull_request(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequestInfo>;

    async fn get_pull_request(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<PullRequestInfo>;

    async fn add_pull_request_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<CommentInfo>;

    async fn list_pull_request_comments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<Vec<CommentInfo>>;

    async fn list_labels(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<LabelInfo>>;

    /// Find a label by name. `Ok(None)` when the repository has no such label.
    async fn get_label(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<LabelInfo>>;

    async fn create_label(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        label: &LabelInfo,
    ) -> Result<LabelInfo>;

    /// Install an SSH deploy key; returns the provider's key id.
    async fn add_deploy_key(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        title: &str,
        key: &str,
        permission: Permission,
    ) -> Result<String>;

    async fn list_environments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<EnvironmentInfo>>;

    /// Upload a SARIF document; returns the provider's upload id.
    async fn upload_code_scanning(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
        git_ref: &str,
        sarif: &[u8],
    ) -> Result<String>;

    /// Download `git_ref` as an archive and extract it into `dest`.
    async fn download_repository(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        git_ref: &str,
        dest: &Path,
        extractor: &dyn ArchiveExtractor,
    ) -> Result<()>;
}
