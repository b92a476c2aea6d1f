//! Bitbucket Server / Data Center REST wire types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pagination::Page;

/// Paged collection envelope used by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: DeserializeOwned"))]
pub struct BbsPaged<T> {
    #[serde(default)]
    pub values: Vec<T>,
    #[serde(default = "default_last")]
    pub is_last_page: bool,
    #[serde(default)]
    pub next_page_start: Option<u32>,
}

fn default_last() -> bool {
    true
}

impl<T> BbsPaged<T> {
    pub fn into_page(self) -> Page<T, u32> {
        let next = if self.is_last_page {
            None
        } else {
            self.next_page_start
        };
        Page::new(self.values, next)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsProject {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsLink {
    pub href: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BbsRepoLinks {
    #[serde(default)]
    pub clone: Vec<BbsLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsRepository {
    pub slug: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub links: BbsRepoLinks,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsCreateRepository<'a> {
    pub name: &'a str,
    pub scm_id: &'static str,
    pub public: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsBranch {
    pub display_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbsWebhookConfiguration<'a> {
    pub secret: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbsWebhookRequest<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub events: Vec<&'static str>,
    pub active: bool,
    pub configuration: BbsWebhookConfiguration<'a>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsId {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbsBuildStatusRequest<'a> {
    pub state: &'static str,
    pub key: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsBuildStatus {
    pub state: String,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsPerson {
    pub name: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsParent {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsCommit {
    pub id: String,
    pub author: BbsPerson,
    /// Epoch milliseconds.
    pub author_timestamp: i64,
    pub committer: BbsPerson,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parents: Vec<BbsParent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsProjectRef {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsRepositoryRef {
    pub slug: String,
    pub project: BbsProjectRef,
}

/// One side of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsRef {
    /// Fully qualified ref, e.g. `refs/heads/main`.
    pub id: String,
    #[serde(default, skip_serializing)]
    pub display_id: String,
    pub repository: BbsRepositoryRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsParticipant {
    pub user: BbsPerson,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BbsPullLinks {
    #[serde(default, rename = "self")]
    pub self_links: Vec<BbsLink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsPullRequest {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// OPEN, MERGED or DECLINED.
    pub state: String,
    pub author: BbsParticipant,
    pub from_ref: BbsRef,
    pub to_ref: BbsRef,
    #[serde(default)]
    pub links: BbsPullLinks,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsPullRequestCreate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub from_ref: BbsRef,
    pub to_ref: BbsRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsComment {
    pub id: u64,
    pub version: u64,
    pub text: String,
    /// Epoch milliseconds.
    pub created_date: i64,
    /// Replies, nested arbitrarily deep.
    #[serde(default)]
    pub comments: Vec<BbsComment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BbsActivity {
    pub action: String,
    #[serde(default)]
    pub comment_action: Option<String>,
    #[serde(default)]
    pub comment: Option<BbsComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbsSshKeyText<'a> {
    pub text: &'a str,
    pub label: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BbsAccessKeyRequest<'a> {
    pub key: BbsSshKeyText<'a>,
    pub permission: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BbsAccessKey {
    pub key: BbsId,
}
