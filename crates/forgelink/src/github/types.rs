//! GitHub REST API wire types.
//!
//! Only the fields the adapter reads are declared, which keeps
//! deserialization resilient to additions on GitHub's side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media type requested on every call.
pub const ACCEPT: &str = "application/vnd.github+json";

/// Pinned REST API version.
pub const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone, Deserialize)]
pub struct GhUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhRepo {
    pub name: String,
    pub owner: GhUser,
    pub clone_url: String,
    pub ssh_url: String,
    #[serde(default)]
    pub private: bool,
    /// "public", "private" or "internal"; absent on older GitHub Enterprise.
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhBranch {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhId {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhHookConfig<'a> {
    pub url: &'a str,
    pub content_type: &'static str,
    pub secret: &'a str,
    pub insecure_ssl: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhHookRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub active: bool,
    pub events: Vec<&'static str>,
    pub config: GhHookConfig<'a>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhStatus {
    pub state: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhStatusRequest<'a> {
    pub state: &'static str,
    pub context: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhGitActor {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhCommitDetail {
    pub author: GhGitActor,
    pub committer: GhGitActor,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhParent {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: GhCommitDetail,
    #[serde(default)]
    pub parents: Vec<GhParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhPullRepo {
    pub name: String,
    pub owner: GhUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhPullRef {
    #[serde(rename = "ref")]
    pub branch: String,
    /// Null when the source fork has been deleted.
    pub repo: Option<GhPullRepo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhPull {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub user: GhUser,
    pub state: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub head: GhPullRef,
    pub base: GhPullRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhPullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GhLabel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhDeployKeyRequest<'a> {
    pub title: &'a str,
    pub key: &'a str,
    pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhEnvironment {
    pub name: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhEnvironments {
    #[serde(default)]
    pub environments: Vec<GhEnvironment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhCreateRepo<'a> {
    pub name: &'a str,
    pub private: bool,
    pub visibility: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhSarifUpload<'a> {
    pub commit_sha: &'a str,
    #[serde(rename = "ref")]
    pub git_ref: &'a str,
    /// Gzipped, base64-encoded SARIF document.
    pub sarif: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhSarifReceipt {
    pub id: String,
}
