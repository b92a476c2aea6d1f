//! Bitbucket Cloud REST API 2.0 wire types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pagination::Page;

/// Web origin for archive downloads, which are not served by the API host.
pub const WEB_URL: &str = "https://bitbucket.org";

/// Paged collection envelope. `next` is a full URL; its presence is the only
/// signal that another page exists.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct BbcPaged<T> {
    #[serde(default)]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> BbcPaged<T> {
    pub fn into_page(self, current: u32) -> Page<T, u32> {
        let next = self.next.is_some().then_some(current + 1);
        Page::new(self.values, next)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcWorkspace {
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcUser {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcLink {
    pub href: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BbcRepoLinks {
    #[serde(default)]
    pub clone: Vec<BbcLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcRepository {
    pub slug: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub links: BbcRepoLinks,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcCreateRepository {
    pub scm: &'static str,
    pub is_private: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcBranch {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcHookRequest<'a> {
    pub description: &'a str,
    pub url: &'a str,
    pub active: bool,
    pub events: Vec<&'static str>,
    pub secret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcHook {
    /// Braced UUID, e.g. `{8a7b...}`.
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcStatusRequest<'a> {
    pub state: &'static str,
    pub key: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcStatus {
    pub state: String,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcAuthor {
    /// `Name <email>` as recorded in the commit.
    pub raw: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcHash {
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcHref {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcHtmlLinks {
    pub html: BbcHref,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcCommit {
    pub hash: String,
    pub author: BbcAuthor,
    pub date: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parents: Vec<BbcHash>,
    pub links: BbcHtmlLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbcBranchName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcFullName {
    /// `workspace/slug`.
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcEndpoint {
    pub branch: BbcBranchName,
    /// Null when the source fork has been deleted.
    #[serde(default)]
    pub repository: Option<BbcFullName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcPullRequest {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// OPEN, MERGED, DECLINED or SUPERSEDED.
    pub state: String,
    pub author: BbcUser,
    pub source: BbcEndpoint,
    pub destination: BbcEndpoint,
    pub links: BbcHtmlLinks,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcBranchEndpoint {
    pub branch: BbcBranchName,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcPullRequestCreate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub source: BbcBranchEndpoint,
    pub destination: BbcBranchEndpoint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcContent {
    #[serde(default)]
    pub raw: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcCommentParent {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcComment {
    pub id: u64,
    pub content: BbcContent,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub parent: Option<BbcCommentParent>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbcDeployKeyRequest<'a> {
    pub key: &'a str,
    pub label: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcId {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbcEnvironment {
    pub name: String,
}
