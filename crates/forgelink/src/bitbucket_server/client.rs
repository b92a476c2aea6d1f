//! Bitbucket Server / Data Center adapter.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{
    branch_ref, events_to_bitbucket, flatten_comment, is_public, permission_to_bitbucket,
    status_from_bitbucket, status_to_bitbucket, to_comment_info, to_commit_info,
    to_pull_request_info, to_repository_info,
};
use super::error::classify;
use super::types::{
    BbsAccessKey, BbsAccessKeyRequest, BbsActivity, BbsBranch, BbsBuildStatus,
    BbsBuildStatusRequest, BbsComment, BbsCommit, BbsCreateRepository, BbsId, BbsPaged,
    BbsProject, BbsProjectRef, BbsPullRequest, BbsPullRequestCreate, BbsRef, BbsRepository,
    BbsRepositoryRef, BbsSshKeyText, BbsWebhookConfiguration, BbsWebhookRequest,
};
use crate::archive::{ArchiveExtractor, RemoteMarker};
use crate::context::CallContext;
use crate::http::{HttpMethod, HttpTransport};
use crate::pagination::{PAGE_SIZE, collect_pages};
use crate::platform::{
    Capability, CommentInfo, CommitInfo, CommitStatusInfo, ConnectionConfig, EnvironmentInfo,
    LabelInfo, NewCommitStatus, NewPullRequest, Op, Permission, ProviderKind, PullRequestInfo,
    RepositoryInfo, RepositoryListing, Result, ScmClient, ScmError, Visibility, WebhookEvent,
    WebhookHandle, add_owner_repos, parse_numeric_id, require,
};
use crate::rest::{RestClient, authorization_header, decode, encode};
use crate::retry::RetryPolicy;
use crate::secret::generate_token;

const API: &str = "/rest/api/1.0";

/// Name given to webhooks this client registers.
const WEBHOOK_NAME: &str = "forgelink";

/// Self-hosted Bitbucket Server client. Owners are project keys.
#[derive(Debug, Clone)]
pub struct BitbucketServerClient {
    rest: RestClient,
    scope: Option<String>,
}

impl BitbucketServerClient {
    /// Create a client for the server at `config.api_url`, which is required.
    ///
    /// Authenticates with HTTP Basic when `config.username` is set, otherwise
    /// with the token as a bearer HTTP access token.
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let base_url = config.resolved_api_url()?;
        let headers = vec![
            authorization_header(config.username.as_deref(), &config.token),
            ("Accept".to_string(), "application/json".to_string()),
        ];

        Ok(Self {
            rest: RestClient::new(transport, base_url, headers, classify),
            scope: config.scope.clone().filter(|s| !s.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.rest = self.rest.with_retry_policy(retry);
        self
    }

    fn repo_path(owner: &str, repo: &str) -> String {
        format!("{API}/projects/{}/repos/{}", encode(owner), encode(repo))
    }

    /// Walk a `start`/`limit` paged collection.
    async fn paginate<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        collect_pages(op, 0u32, |start| async move {
            let url = format!("{path}{sep}limit={PAGE_SIZE}&start={start}");
            let paged: BbsPaged<T> = self.rest.get_json(ctx, op, &url).await?;
            Ok(paged.into_page())
        })
        .await
    }

    async fn send_webhook(
        &self,
        ctx: &CallContext,
        op: &Op,
        method: HttpMethod,
        path: &str,
        url: &str,
        events: &[WebhookEvent],
    ) -> Result<WebhookHandle> {
        let token = generate_token();
        let body = BbsWebhookRequest {
            name: WEBHOOK_NAME,
            url,
            events: events_to_bitbucket(events),
            active: true,
            configuration: BbsWebhookConfiguration { secret: &token },
        };
        let response = self.rest.send_body(ctx, op, method, path, &body).await?;
        let hook: BbsId = decode(op, &response)?;
        Ok(WebhookHandle {
            id: hook.id.to_string(),
            token,
        })
    }

    fn pull_ref(owner: &str, repo: &str, branch: &str) -> BbsRef {
        BbsRef {
            id: branch_ref(branch),
            display_id: String::new(),
            repository: BbsRepositoryRef {
                slug: repo.to_string(),
                project: BbsProjectRef {
                    key: owner.to_string(),
                },
            },
        }
    }
}

#[async_trait]
impl ScmClient for BitbucketServerClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::BitbucketServer
    }

    async fn test_connection(&self, ctx: &CallContext) -> Result<()> {
        let op = Op::new("test connection", self.rest.base_url());
        let _: BbsPaged<BbsProject> = self
            .rest
            .get_json(ctx, &op, &format!("{API}/projects?limit=1"))
            .await?;
        Ok(())
    }

    async fn list_repositories(&self, ctx: &CallContext) -> Result<RepositoryListing> {
        let op = Op::new("list repositories", self.scope.as_deref().unwrap_or("*"));
        let keys = match &self.scope {
            Some(key) => vec![key.clone()],
            None => self
                .paginate::<BbsProject>(ctx, &op, &format!("{API}/projects"))
                .await?
                .into_iter()
                .map(|p| p.key)
                .collect(),
        };

        let mut listing = RepositoryListing::new();
        for key in keys {
            let repos: Vec<BbsRepository> = self
                .paginate(ctx, &op, &format!("{API}/projects/{}/repos", encode(&key)))
                .await?;
            add_owner_repos(
                &mut listing,
                &key,
                repos.into_iter().map(|r| r.slug).collect(),
            );
        }
        Ok(listing)
    }

    async fn list_branches(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<String>> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("list branches", owner, repo);
        let branches: Vec<BbsBranch> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/branches", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(branches.into_iter().map(|b| b.display_id).collect())
    }

    async fn get_repository_info(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("get repository", owner, repo);
        let repository: BbsRepository = self
            .rest
            .get_json(ctx, &op, &Self::repo_path(owner, repo))
            .await?;
        Ok(to_repository_info(&repository))
    }

    async fn create_repository(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        visibility: Visibility,
    ) -> Result<RepositoryInfo> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("create repository", owner, repo);
        let body = BbsCreateRepository {
            name: repo,
            scm_id: "git",
            public: is_public(visibility),
        };
        let created: BbsRepository = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{API}/projects/{}/repos", encode(owner)),
                &body,
            )
            .await?;
        Ok(to_repository_info(&created))
    }

    async fn create_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        url: &str,
        events: &[WebhookEvent],
    ) -> Result<WebhookHandle> {
        require(&[("owner", owner), ("repository", repo), ("url", url)])?;
        let op = Op::repo("create webhook", owner, repo);
        let path = format!("{}/webhooks", Self::repo_path(owner, repo));
        self.send_webhook(ctx, &op, HttpMethod::Post, &path, url, events)
            .await
    }

    async fn update_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: &str,
        url: &str,
        events: &[WebhookEvent],
    ) -> Result<WebhookHandle> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("webhook id", id),
            ("url", url),
        ])?;
        let id = parse_numeric_id("webhook id", id)?;
        let op = Op::repo("update webhook", owner, repo);
        let path = format!("{}/webhooks/{id}", Self::repo_path(owner, repo));
        self.send_webhook(ctx, &op, HttpMethod::Put, &path, url, events)
            .await
    }

    async fn delete_webhook(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: &str,
    ) -> Result<()> {
        require(&[("owner", owner), ("repository", repo), ("webhook id", id)])?;
        let id = parse_numeric_id("webhook id", id)?;
        let op = Op::repo("delete webhook", owner, repo);
        self.rest
            .delete(
                ctx,
                &op,
                &format!("{}/webhooks/{id}", Self::repo_path(owner, repo)),
            )
            .await
    }

    async fn set_commit_status(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &NewCommitStatus,
    ) -> Result<()> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("sha", sha),
            ("context", &status.context),
        ])?;
        let op = Op::repo("set commit status", owner, repo);
        let body = BbsBuildStatusRequest {
            state: status_to_bitbucket(status.state),
            key: &status.context,
            name: &status.context,
            description: &status.description,
            url: status.target_url.as_deref(),
        };
        self.rest
            .send_body(
                ctx,
                &op,
                HttpMethod::Post,
                &format!("/rest/build-status/1.0/commits/{sha}"),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn get_commit_statuses(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<CommitStatusInfo>> {
        require(&[("owner", owner), ("repository", repo), ("sha", sha)])?;
        let op = Op::repo("get commit statuses", owner, repo);
        let statuses: Vec<BbsBuildStatus> = self
            .paginate(ctx, &op, &format!("/rest/build-status/1.0/commits/{sha}"))
            .await?;
        Ok(statuses
            .into_iter()
            .map(|s| CommitStatusInfo {
                state: status_from_bitbucket(&s.state),
                context: s.key,
                description: s.description.unwrap_or_default(),
                target_url: s.url,
            })
            .collect())
    }

    async fn get_commit(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CommitInfo> {
        require(&[("owner", owner), ("repository", repo), ("sha", sha)])?;
        let op = Op::repo("get commit", owner, repo);
        let commit: BbsCommit = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/commits/{sha}", Self::repo_path(owner, repo)),
            )
            .await?;
        let web_url = format!(
            "{}/projects/{owner}/repos/{repo}/commits/{}",
            self.rest.base_url(),
            commit.id
        );
        to_commit_info(&op, commit, web_url)
    }

    async fn create_pull_request(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequestInfo> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("title", &pr.title),
            ("source branch", &pr.source_branch),
            ("target branch", &pr.target_branch),
        ])?;
        let op = Op::repo("create pull request", owner, repo);
        let body = BbsPullRequestCreate {
            title: &pr.title,
            description: &pr.body,
            from_ref: Self::pull_ref(owner, repo, &pr.source_branch),
            to_ref: Self::pull_ref(owner, repo, &pr.target_branch),
        };
        let created: BbsPullRequest = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/pull-requests", Self::repo_path(owner, repo)),
                &body,
            )
            .await?;
        Ok(to_pull_request_info(created))
    }

    async fn get_pull_request(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<PullRequestInfo> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("get pull request", owner, repo);
        let pr: BbsPullRequest = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/pull-requests/{id}", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(to_pull_request_info(pr))
    }

    async fn add_pull_request_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<CommentInfo> {
        require(&[("owner", owner), ("repository", repo), ("body", body)])?;
        let op = Op::repo("add pull request comment", owner, repo);
        let comment: BbsComment = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!(
                    "{}/pull-requests/{id}/comments",
                    Self::repo_path(owner, repo)
                ),
                &serde_json::json!({ "text": body }),
            )
            .await?;
        to_comment_info(&op, &comment, None)
    }

    async fn list_pull_request_comments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<Vec<CommentInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("list pull request comments", owner, repo);
        let activities: Vec<BbsActivity> = self
            .paginate(
                ctx,
                &op,
                &format!(
                    "{}/pull-requests/{id}/activities",
                    Self::repo_path(owner, repo)
                ),
            )
            .await?;

        // Activities arrive newest first.
        let mut comments = Vec::new();
        for activity in activities.iter().rev() {
            if activity.action != "COMMENTED"
                || activity.comment_action.as_deref() != Some("ADDED")
            {
                continue;
            }
            if let Some(comment) = &activity.comment {
                flatten_comment(&op, comment, &mut comments)?;
            }
        }
        Ok(comments)
    }

    async fn list_labels(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        Err(ScmError::unsupported(
            ProviderKind::BitbucketServer,
            Capability::Labels,
        ))
    }

    async fn get_label(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo), ("label", name)])?;
        Err(ScmError::unsupported(
            ProviderKind::BitbucketServer,
            Capability::Labels,
        ))
    }

    async fn create_label(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
        label: &LabelInfo,
    ) -> Result<LabelInfo> {
        require(&[("owner", owner), ("repository", repo), ("label", &label.name)])?;
        Err(ScmError::unsupported(
            ProviderKind::BitbucketServer,
            Capability::Labels,
        ))
    }

    async fn add_deploy_key(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        title: &str,
        key: &str,
        permission: Permission,
    ) -> Result<String> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("title", title),
            ("key", key),
        ])?;
        let op = Op::repo("add deploy key", owner, repo);
        let body = BbsAccessKeyRequest {
            key: BbsSshKeyText { text: key, label: title },
            permission: permission_to_bitbucket(permission),
        };
        let created: BbsAccessKey = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!(
                    "/rest/keys/1.0/projects/{}/repos/{}/ssh",
                    encode(owner),
                    encode(repo)
                ),
                &body,
            )
            .await?;
        Ok(created.key.id.to_string())
    }

    async fn list_environments(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<EnvironmentInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        Err(ScmError::unsupported(
            ProviderKind::BitbucketServer,
            Capability::Environments,
        ))
    }

    async fn upload_code_scanning(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
        git_ref: &str,
        _sarif: &[u8],
    ) -> Result<String> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("sha", sha),
            ("ref", git_ref),
        ])?;
        Err(ScmError::unsupported(
            ProviderKind::BitbucketServer,
            Capability::CodeScanning,
        ))
    }

    async fn download_repository(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        git_ref: &str,
        dest: &Path,
        extractor: &dyn ArchiveExtractor,
    ) -> Result<()> {
        require(&[("owner", owner), ("repository", repo), ("ref", git_ref)])?;
        let info = self.get_repository_info(ctx, owner, repo).await?;

        let op = Op::repo("download repository", owner, repo);
        let bytes = self
            .rest
            .get_bytes(
                ctx,
                &op,
                &format!(
                    "{}/archive?at={}&format=tgz",
                    Self::repo_path(owner, repo),
                    encode(git_ref)
                ),
            )
            .await?;
        extractor.extract(&bytes, dest, 0)?;
        extractor.write_marker(
            dest,
            &RemoteMarker {
                provider: ProviderKind::BitbucketServer,
                owner: owner.to_string(),
                repo: repo.to_string(),
                http_clone_url: info.http_clone_url,
                ssh_clone_url: info.ssh_clone_url,
                git_ref: git_ref.to_string(),
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::archive::{MARKER_FILE, TarGzExtractor, test_tarball};
    use crate::http::{HttpResponse, MockTransport};
    use crate::platform::{CommitStatus, PullRequestState};

    const SERVER: &str = "https://git.example.com";
    const REPO: &str = "https://git.example.com/rest/api/1.0/projects/PRJ/repos/widgets";

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(ProviderKind::BitbucketServer, "secret")
            .with_api_url(format!("{SERVER}/"))
    }

    fn client(transport: &MockTransport) -> BitbucketServerClient {
        BitbucketServerClient::new(&config(), Arc::new(transport.clone()))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(1)))
    }

    fn repo_json() -> serde_json::Value {
        json!({
            "slug": "widgets",
            "public": false,
            "links": {"clone": [
                {"href": "ssh://git@git.example.com:7999/prj/widgets.git", "name": "ssh"},
                {"href": "https://git.example.com/scm/prj/widgets.git", "name": "http"}
            ]}
        })
    }

    fn pull_json(state: &str) -> serde_json::Value {
        json!({
            "id": 12,
            "title": "Faster widgets",
            "description": "Speeds things up",
            "state": state,
            "author": {"user": {"name": "Ada Lovelace", "slug": "ada"}},
            "fromRef": {"id": "refs/heads/perf", "displayId": "perf",
                        "repository": {"slug": "widgets-fork", "project": {"key": "~ADA"}}},
            "toRef": {"id": "refs/heads/main", "displayId": "main",
                      "repository": {"slug": "widgets", "project": {"key": "PRJ"}}},
            "links": {"self": [{"href": "https://git.example.com/projects/PRJ/repos/widgets/pull-requests/12"}]}
        })
    }

    #[test]
    fn test_requires_api_url() {
        let config = ConnectionConfig::new(ProviderKind::BitbucketServer, "secret");
        let err = BitbucketServerClient::new(&config, Arc::new(MockTransport::new())).unwrap_err();
        assert!(matches!(err, ScmError::Config(_)));
    }

    #[tokio::test]
    async fn test_basic_auth_with_username() {
        let transport = MockTransport::new();
        let client =
            BitbucketServerClient::new(&config().with_username("ada"), Arc::new(transport.clone()))
                .unwrap();
        transport.push_json(
            HttpMethod::Get,
            format!("{SERVER}/rest/api/1.0/projects?limit=1"),
            200,
            &json!({"values": [], "isLastPage": true}),
        );

        client.test_connection(&CallContext::new()).await.unwrap();

        let headers = &transport.requests()[0].headers;
        assert!(headers.contains(&(
            "Authorization".to_string(),
            "Basic YWRhOnNlY3JldA==".to_string()
        )));
    }

    #[tokio::test]
    async fn test_list_branches_follows_next_page_start() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/branches?limit=100&start=0"),
            200,
            &json!({"values": [{"displayId": "main"}, {"displayId": "dev"}], "isLastPage": false, "nextPageStart": 2}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/branches?limit=100&start=2"),
            200,
            &json!({"values": [{"displayId": "release"}], "isLastPage": true}),
        );

        let branches = client(&transport)
            .list_branches(&CallContext::new(), "PRJ", "widgets")
            .await
            .unwrap();
        assert_eq!(branches, vec!["main", "dev", "release"]);
    }

    #[tokio::test]
    async fn test_list_repositories_groups_by_project_key() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{SERVER}/rest/api/1.0/projects?limit=100&start=0"),
            200,
            &json!({"values": [{"key": "PRJ"}, {"key": "EMPTY"}], "isLastPage": true}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{SERVER}/rest/api/1.0/projects/PRJ/repos?limit=100&start=0"),
            200,
            &json!({"values": [repo_json()], "isLastPage": true}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{SERVER}/rest/api/1.0/projects/EMPTY/repos?limit=100&start=0"),
            200,
            &json!({"values": [], "isLastPage": true}),
        );

        let listing = client(&transport)
            .list_repositories(&CallContext::new())
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["PRJ"], vec!["widgets"]);
    }

    #[tokio::test]
    async fn test_get_repository_info_picks_clone_links() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, REPO, 200, &repo_json());

        let info = client(&transport)
            .get_repository_info(&CallContext::new(), "PRJ", "widgets")
            .await
            .unwrap();
        assert_eq!(info.http_clone_url, "https://git.example.com/scm/prj/widgets.git");
        assert_eq!(info.ssh_clone_url, "ssh://git@git.example.com:7999/prj/widgets.git");
        assert_eq!(info.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_create_webhook_sends_secret_and_events() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, format!("{REPO}/webhooks"), 201, &json!({"id": 7}));

        let handle = client(&transport)
            .create_webhook(
                &CallContext::new(),
                "PRJ",
                "widgets",
                "https://ci.example.com/hook",
                &[WebhookEvent::Push, WebhookEvent::TagPushed, WebhookEvent::PrOpened],
            )
            .await
            .unwrap();
        assert_eq!(handle.id, "7");

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["events"], json!(["repo:refs_changed", "pr:opened"]));
        assert_eq!(sent["configuration"]["secret"], handle.token.as_str());
        assert_eq!(sent["active"], true);
    }

    #[tokio::test]
    async fn test_delete_webhook_rejects_non_numeric_id() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .delete_webhook(&CallContext::new(), "PRJ", "widgets", "{abc}")
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::InvalidArgument { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_commit_statuses_use_build_status_api() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{SERVER}/rest/build-status/1.0/commits/abc?limit=100&start=0"),
            200,
            &json!({"values": [
                {"state": "SUCCESSFUL", "key": "ci/build", "url": "https://ci/1"},
                {"state": "STOPPED", "key": "ci/deploy", "description": "aborted"}
            ], "isLastPage": true}),
        );

        let statuses = client(&transport)
            .get_commit_statuses(&CallContext::new(), "PRJ", "widgets", "abc")
            .await
            .unwrap();
        assert_eq!(statuses[0].state, CommitStatus::Pass);
        assert_eq!(statuses[0].target_url.as_deref(), Some("https://ci/1"));
        assert_eq!(statuses[1].state, CommitStatus::Error);
        assert_eq!(statuses[1].description, "aborted");
    }

    #[tokio::test]
    async fn test_get_commit_converts_millis() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/commits/abc"),
            200,
            &json!({
                "id": "abc",
                "author": {"name": "Ada", "emailAddress": "ada@example.com"},
                "authorTimestamp": 1_704_067_200_000_i64,
                "committer": {"name": "Grace"},
                "message": "Initial",
                "parents": [{"id": "def"}]
            }),
        );

        let commit = client(&transport)
            .get_commit(&CallContext::new(), "PRJ", "widgets", "abc")
            .await
            .unwrap();
        assert_eq!(commit.timestamp, 1_704_067_200);
        assert_eq!(commit.committer_name, "Grace");
        assert_eq!(commit.parents, vec!["def"]);
        assert_eq!(
            commit.url,
            "https://git.example.com/projects/PRJ/repos/widgets/commits/abc"
        );
    }

    #[tokio::test]
    async fn test_create_pull_request_qualifies_refs() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{REPO}/pull-requests"),
            201,
            &pull_json("OPEN"),
        );

        let pr = client(&transport)
            .create_pull_request(
                &CallContext::new(),
                "PRJ",
                "widgets",
                &NewPullRequest {
                    title: "Faster widgets".to_string(),
                    body: "Speeds things up".to_string(),
                    source_branch: "perf".to_string(),
                    target_branch: "main".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(pr.source_owner, "~ADA");
        assert_eq!(pr.source_repo, "widgets-fork");
        assert_eq!(pr.author, "ada");
        assert_eq!(pr.state, PullRequestState::Open);

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["fromRef"]["id"], "refs/heads/perf");
        assert_eq!(sent["toRef"]["repository"]["project"]["key"], "PRJ");
        assert!(sent["fromRef"].get("displayId").is_none());
    }

    #[tokio::test]
    async fn test_declined_pull_request_is_closed() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/pull-requests/12"),
            200,
            &pull_json("DECLINED"),
        );

        let pr = client(&transport)
            .get_pull_request(&CallContext::new(), "PRJ", "widgets", 12)
            .await
            .unwrap();
        assert_eq!(pr.state, PullRequestState::Closed);
        assert_eq!(pr.target_branch, "main");
    }

    #[tokio::test]
    async fn test_list_comments_from_activities() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/pull-requests/12/activities?limit=100&start=0"),
            200,
            &json!({"values": [
                {"action": "COMMENTED", "commentAction": "ADDED",
                 "comment": {"id": 9, "version": 2, "text": "Second", "createdDate": 1_704_067_260_000_i64}},
                {"action": "APPROVED"},
                {"action": "COMMENTED", "commentAction": "ADDED",
                 "comment": {"id": 8, "version": 0, "text": "First", "createdDate": 1_704_067_200_000_i64,
                             "comments": [{"id": 10, "version": 0, "text": "Reply", "createdDate": 1_704_067_230_000_i64}]}}
            ], "isLastPage": true}),
        );

        let comments = client(&transport)
            .list_pull_request_comments(&CallContext::new(), "PRJ", "widgets", 12)
            .await
            .unwrap();
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "10", "9"]);
        assert_eq!(comments[1].thread_id.as_deref(), Some("8"));
        assert_eq!(comments[2].version, Some(2));
    }

    #[tokio::test]
    async fn test_unsupported_capabilities_send_nothing() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let ctx = CallContext::new();

        let err = client.list_labels(&ctx, "PRJ", "widgets").await.unwrap_err();
        assert!(matches!(err, ScmError::Unsupported { capability: Capability::Labels, .. }));

        let err = client.list_environments(&ctx, "PRJ", "widgets").await.unwrap_err();
        assert!(matches!(err, ScmError::Unsupported { capability: Capability::Environments, .. }));

        let err = client
            .upload_code_scanning(&ctx, "PRJ", "widgets", "abc", "refs/heads/main", b"{}")
            .await
            .unwrap_err();
        assert!(err.is_unsupported());

        // Validation still comes first.
        let err = client.get_label(&ctx, "", "widgets", "bug").await.unwrap_err();
        assert!(matches!(err, ScmError::MissingParameters { .. }));

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_key_permission() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{SERVER}/rest/keys/1.0/projects/PRJ/repos/widgets/ssh"),
            201,
            &json!({"key": {"id": 33, "text": "ssh-ed25519 AAAA", "label": "ci"}, "permission": "REPO_WRITE"}),
        );

        let id = client(&transport)
            .add_deploy_key(&CallContext::new(), "PRJ", "widgets", "ci", "ssh-ed25519 AAAA", Permission::ReadWrite)
            .await
            .unwrap();
        assert_eq!(id, "33");

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["permission"], "REPO_WRITE");
        assert_eq!(sent["key"]["label"], "ci");
    }

    #[tokio::test]
    async fn test_download_writes_remote_marker() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, REPO, 200, &repo_json());
        transport.push_response(
            HttpMethod::Get,
            format!("{REPO}/archive?at=refs%2Fheads%2Fmain&format=tgz"),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: test_tarball(&[("README.md", "# widgets")]),
            },
        );
        let dir = tempfile::tempdir().unwrap();

        client(&transport)
            .download_repository(&CallContext::new(), "PRJ", "widgets", "refs/heads/main", dir.path(), &TarGzExtractor)
            .await
            .unwrap();

        assert!(dir.path().join("README.md").exists());
        let marker: RemoteMarker =
            serde_json::from_slice(&std::fs::read(dir.path().join(MARKER_FILE)).unwrap()).unwrap();
        assert_eq!(marker.provider, ProviderKind::BitbucketServer);
        assert_eq!(marker.git_ref, "refs/heads/main");
        assert_eq!(marker.http_clone_url, "https://git.example.com/scm/prj/widgets.git");
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_is_retried() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, REPO, 429, &json!({"errors": [{"message": "Too many requests"}]}));
        transport.push_json(HttpMethod::Get, REPO, 200, &repo_json());

        client(&transport)
            .get_repository_info(&CallContext::new(), "PRJ", "widgets")
            .await
            .unwrap();
        assert_eq!(transport.requests().len(), 2);
    }
}
