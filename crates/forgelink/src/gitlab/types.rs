//! GitLab REST API (v4) wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the personal/project access token.
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// GitLab namespace (group or user).
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabNamespace {
    pub id: u64,
    /// Namespace path (slug).
    pub path: String,
    /// Full path (e.g., "group/subgroup").
    pub full_path: String,
    /// Kind: "group" or "user".
    pub kind: String,
}

/// GitLab project - fields we need from the API response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    /// Project path (slug).
    pub path: String,
    /// Full path including namespace (e.g., "group/subgroup/project").
    pub path_with_namespace: String,
    /// Visibility level: "public", "private", or "internal".
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub ssh_url_to_repo: Option<String>,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLabCreateProject<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub namespace_id: u64,
    pub visibility: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabId {
    pub id: u64,
}

/// Project hook create/update body. Every event flag is sent explicitly so
/// an update replaces the previous selection.
#[derive(Debug, Clone, Serialize)]
pub struct GitLabHookRequest<'a> {
    pub url: &'a str,
    pub token: &'a str,
    pub push_events: bool,
    pub tag_push_events: bool,
    pub merge_requests_events: bool,
    pub note_events: bool,
    pub enable_ssl_verification: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLabStatusRequest<'a> {
    pub state: &'static str,
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabStatus {
    pub status: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommit {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub web_url: String,
    pub authored_date: String,
    pub message: String,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub web_url: String,
    pub author: GitLabUser,
    pub source_branch: String,
    pub target_branch: String,
    pub source_project_id: Option<u64>,
    pub target_project_id: Option<u64>,
    /// "opened", "closed", "locked" or "merged".
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLabMergeRequestCreate<'a> {
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabNote {
    pub id: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// System notes record events ("added 1 commit"), not user comments.
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabLabel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `#rrggbb`.
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLabLabelRequest<'a> {
    pub name: &'a str,
    pub color: String,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitLabDeployKeyRequest<'a> {
    pub title: &'a str,
    pub key: &'a str,
    pub can_push: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabEnvironment {
    pub name: String,
    #[serde(default)]
    pub external_url: Option<String>,
}
