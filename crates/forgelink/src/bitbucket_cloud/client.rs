//! Bitbucket Cloud adapter.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{
    braced, events_to_bitbucket, is_private, parse_webhook_id, status_from_bitbucket,
    status_to_bitbucket, to_comment_info, to_commit_info, to_pull_request_info,
    to_repository_info,
};
use super::error::classify;
use super::types::{
    BbcBranch, BbcBranchEndpoint, BbcBranchName, BbcComment, BbcCommit, BbcCreateRepository,
    BbcDeployKeyRequest, BbcEnvironment, BbcHook, BbcHookRequest, BbcId, BbcPaged,
    BbcPullRequest, BbcPullRequestCreate, BbcRepository, BbcStatus, BbcStatusRequest, BbcUser,
    BbcWorkspace, WEB_URL,
};
use crate::archive::{ArchiveExtractor, RemoteMarker};
use crate::context::CallContext;
use crate::http::{HttpMethod, HttpTransport};
use crate::pagination::{PAGE_SIZE, collect_pages};
use crate::platform::{
    Capability, CommentInfo, CommitInfo, CommitStatusInfo, ConnectionConfig, EnvironmentInfo,
    LabelInfo, NewCommitStatus, NewPullRequest, Op, Permission, ProviderKind, PullRequestInfo,
    RepositoryInfo, RepositoryListing, Result, ScmClient, ScmError, Visibility, WebhookEvent,
    WebhookHandle, add_owner_repos, require,
};
use crate::rest::{RestClient, authorization_header, decode, encode};
use crate::retry::RetryPolicy;
use crate::secret::generate_token;

/// Description given to webhooks this client registers.
const WEBHOOK_DESCRIPTION: &str = "forgelink";

/// bitbucket.org client. Owners are workspace slugs.
#[derive(Debug, Clone)]
pub struct BitbucketCloudClient {
    rest: RestClient,
    scope: Option<String>,
}

impl BitbucketCloudClient {
    /// Create a client for `config.api_url` (default `https://api.bitbucket.org/2.0`).
    ///
    /// With `config.username` set the token is an app password sent with
    /// Basic auth; otherwise it is an access token sent as a bearer token.
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
        format!("/repositories/{}/{}", encode(owner), encode(repo))
    }

    async fn paginate<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        collect_pages(op, 1u32, |page| async move {
            let url = format!("{path}{sep}pagelen={PAGE_SIZE}&page={page}");
            let paged: BbcPaged<T> = self.rest.get_json(ctx, op, &url).await?;
            Ok(paged.into_page(page))
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
        let body = BbcHookRequest {
            description: WEBHOOK_DESCRIPTION,
            url,
            active: true,
            events: events_to_bitbucket(events),
            secret: &token,
        };
        let response = self.rest.send_body(ctx, op, method, path, &body).await?;
        let hook: BbcHook = decode(op, &response)?;
        Ok(WebhookHandle {
            id: hook.uuid,
            token,
        })
    }

    fn hook_path(owner: &str, repo: &str, id: &str) -> Result<String> {
        let id = parse_webhook_id(id)?;
        Ok(format!(
            "{}/hooks/{}",
            Self::repo_path(owner, repo),
            encode(&braced(id))
        ))
    }

    fn unsupported(capability: Capability) -> ScmError {
        ScmError::unsupported(ProviderKind::BitbucketCloud, capability)
    }
}

#[async_trait]
impl ScmClient for BitbucketCloudClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::BitbucketCloud
    }

    async fn test_connection(&self, ctx: &CallContext) -> Result<()> {
        let op = Op::new("test connection", self.rest.base_url());
        let user: BbcUser = self.rest.get_json(ctx, &op, "/user").await?;
        tracing::debug!("Connected to Bitbucket Cloud as {}", user.display_name);
        Ok(())
    }

    async fn list_repositories(&self, ctx: &CallContext) -> Result<RepositoryListing> {
        let op = Op::new("list repositories", self.scope.as_deref().unwrap_or("*"));
        let workspaces = match &self.scope {
            Some(workspace) => vec![workspace.clone()],
            None => self
                .paginate::<BbcWorkspace>(ctx, &op, "/workspaces")
                .await?
                .into_iter()
                .map(|w| w.slug)
                .collect(),
        };

        let mut listing = RepositoryListing::new();
        for workspace in workspaces {
            let repos: Vec<BbcRepository> = self
                .paginate(ctx, &op, &format!("/repositories/{}", encode(&workspace)))
                .await?;
            add_owner_repos(
                &mut listing,
                &workspace,
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
        let branches: Vec<BbcBranch> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/refs/branches", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn get_repository_info(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("get repository", owner, repo);
        let repository: BbcRepository = self
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
        let body = BbcCreateRepository {
            scm: "git",
            is_private: is_private(visibility),
        };
        let created: BbcRepository = self
            .rest
            .post_json(ctx, &op, &Self::repo_path(owner, repo), &body)
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
        let path = format!("{}/hooks", Self::repo_path(owner, repo));
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
        let path = Self::hook_path(owner, repo, id)?;
        let op = Op::repo("update webhook", owner, repo);
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
        let path = Self::hook_path(owner, repo, id)?;
        let op = Op::repo("delete webhook", owner, repo);
        self.rest.delete(ctx, &op, &path).await
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
        let body = BbcStatusRequest {
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
                &format!(
                    "{}/commit/{sha}/statuses/build",
                    Self::repo_path(owner, repo)
                ),
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
        let statuses: Vec<BbcStatus> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/commit/{sha}/statuses", Self::repo_path(owner, repo)),
            )
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
        let commit: BbcCommit = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/commit/{sha}", Self::repo_path(owner, repo)),
            )
            .await?;
        to_commit_info(&op, commit)
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
        let body = BbcPullRequestCreate {
            title: &pr.title,
            description: &pr.body,
            source: BbcBranchEndpoint {
                branch: BbcBranchName {
                    name: pr.source_branch.clone(),
                },
            },
            destination: BbcBranchEndpoint {
                branch: BbcBranchName {
                    name: pr.target_branch.clone(),
                },
            },
        };
        let created: BbcPullRequest = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/pullrequests", Self::repo_path(owner, repo)),
                &body,
            )
            .await?;
        to_pull_request_info(&op, created)
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
        let pr: BbcPullRequest = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/pullrequests/{id}", Self::repo_path(owner, repo)),
            )
            .await?;
        to_pull_request_info(&op, pr)
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
        let comment: BbcComment = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!(
                    "{}/pullrequests/{id}/comments",
                    Self::repo_path(owner, repo)
                ),
                &serde_json::json!({ "content": { "raw": body } }),
            )
            .await?;
        Ok(to_comment_info(comment))
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
        let comments: Vec<BbcComment> = self
            .paginate(
                ctx,
                &op,
                &format!(
                    "{}/pullrequests/{id}/comments",
                    Self::repo_path(owner, repo)
                ),
            )
            .await?;
        Ok(comments
            .into_iter()
            .filter(|c| !c.deleted)
            .map(to_comment_info)
            .collect())
    }

    async fn list_labels(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        Err(Self::unsupported(Capability::Labels))
    }

    async fn get_label(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo), ("label", name)])?;
        Err(Self::unsupported(Capability::Labels))
    }

    async fn create_label(
        &self,
        _ctx: &CallContext,
        owner: &str,
        repo: &str,
        label: &LabelInfo,
    ) -> Result<LabelInfo> {
        require(&[("owner", owner), ("repository", repo), ("label", &label.name)])?;
        Err(Self::unsupported(Capability::Labels))
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
        // Access keys on Cloud are always read-only.
        if permission == Permission::ReadWrite {
            return Err(Self::unsupported(Capability::WriteDeployKeys));
        }
        let op = Op::repo("add deploy key", owner, repo);
        let created: BbcId = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/deploy-keys", Self::repo_path(owner, repo)),
                &BbcDeployKeyRequest { key, label: title },
            )
            .await?;
        Ok(created.id.to_string())
    }

    async fn list_environments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<EnvironmentInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("list environments", owner, repo);
        let environments: Vec<BbcEnvironment> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/environments/", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(environments
            .into_iter()
            .map(|e| EnvironmentInfo {
                name: e.name,
                url: None,
            })
            .collect())
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
        Err(Self::unsupported(Capability::CodeScanning))
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
        let url = format!(
            "{WEB_URL}/{}/{}/get/{}.tar.gz",
            encode(owner),
            encode(repo),
            encode(git_ref)
        );
        let bytes = self.rest.get_bytes(ctx, &op, &url).await?;
        // Archives wrap everything in `<workspace>-<repo>-<short sha>/`.
        extractor.extract(&bytes, dest, 1)?;
        extractor.write_marker(
            dest,
            &RemoteMarker {
                provider: ProviderKind::BitbucketCloud,
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

    const API: &str = "https://api.bitbucket.org/2.0";
    const REPO: &str = "https://api.bitbucket.org/2.0/repositories/acme/widgets";
    const HOOK_ID: &str = "8a7b1c2d-0e4f-4a5b-9c6d-7e8f9a0b1c2d";

    fn client(transport: &MockTransport) -> BitbucketCloudClient {
        let config = ConnectionConfig::new(ProviderKind::BitbucketCloud, "app-password")
            .with_username("ada");
        BitbucketCloudClient::new(&config, Arc::new(transport.clone()))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(1)))
    }

    fn repo_json() -> serde_json::Value {
        json!({
            "slug": "widgets",
            "is_private": true,
            "links": {"clone": [
                {"href": "https://bitbucket.org/acme/widgets.git", "name": "https"},
                {"href": "git@bitbucket.org:acme/widgets.git", "name": "ssh"}
            ]}
        })
    }

    fn pull_json(source: serde_json::Value) -> serde_json::Value {
        json!({
            "id": 5,
            "title": "Faster widgets",
            "description": "Speeds things up",
            "state": "MERGED",
            "author": {"display_name": "Ada Lovelace", "nickname": "ada"},
            "source": {"branch": {"name": "perf"}, "repository": source},
            "destination": {"branch": {"name": "main"}, "repository": {"full_name": "acme/widgets"}},
            "links": {"html": {"href": "https://bitbucket.org/acme/widgets/pull-requests/5"}}
        })
    }

    #[tokio::test]
    async fn test_list_branches_follows_next() {
        let transport = MockTransport::new();
        let base = format!("{REPO}/refs/branches?pagelen=100");
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=1"),
            200,
            &json!({"values": [{"name": "main"}], "next": format!("{base}&page=2")}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{base}&page=2"),
            200,
            &json!({"values": [{"name": "dev"}]}),
        );

        let branches = client(&transport)
            .list_branches(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap();
        assert_eq!(branches, vec!["main", "dev"]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_list_repositories_uses_workspaces() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/workspaces?pagelen=100&page=1"),
            200,
            &json!({"values": [{"slug": "acme"}, {"slug": "empty"}]}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/repositories/acme?pagelen=100&page=1"),
            200,
            &json!({"values": [repo_json()]}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/repositories/empty?pagelen=100&page=1"),
            200,
            &json!({"values": []}),
        );

        let listing = client(&transport)
            .list_repositories(&CallContext::new())
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["acme"], vec!["widgets"]);
    }

    #[tokio::test]
    async fn test_create_webhook_returns_uuid() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{REPO}/hooks"),
            201,
            &json!({"uuid": format!("{{{HOOK_ID}}}")}),
        );

        let handle = client(&transport)
            .create_webhook(
                &CallContext::new(),
                "acme",
                "widgets",
                "https://ci.example.com/hook",
                &[WebhookEvent::PrOpened, WebhookEvent::TagPushed, WebhookEvent::Push],
            )
            .await
            .unwrap();
        assert_eq!(handle.id, format!("{{{HOOK_ID}}}"));

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["events"], json!(["pullrequest:created", "repo:push"]));
        assert_eq!(sent["secret"], handle.token.as_str());
    }

    #[tokio::test]
    async fn test_update_webhook_accepts_bare_uuid() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Put,
            format!("{REPO}/hooks/%7B{HOOK_ID}%7D"),
            200,
            &json!({"uuid": format!("{{{HOOK_ID}}}")}),
        );

        let first = client(&transport)
            .update_webhook(&CallContext::new(), "acme", "widgets", HOOK_ID, "https://x", &[WebhookEvent::Push])
            .await
            .unwrap();
        assert_eq!(first.token.len(), 64);
    }

    #[tokio::test]
    async fn test_delete_webhook_rejects_numeric_id() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .delete_webhook(&CallContext::new(), "acme", "widgets", "42")
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::InvalidArgument { name: "webhook id", .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_set_commit_status() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{REPO}/commit/abc/statuses/build"),
            201,
            &json!({"state": "INPROGRESS", "key": "ci/build"}),
        );

        client(&transport)
            .set_commit_status(
                &CallContext::new(),
                "acme",
                "widgets",
                "abc",
                &NewCommitStatus {
                    state: CommitStatus::InProgress,
                    context: "ci/build".to_string(),
                    description: "building".to_string(),
                    target_url: None,
                },
            )
            .await
            .unwrap();

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["state"], "INPROGRESS");
        assert_eq!(sent["key"], "ci/build");
        assert!(sent.get("url").is_none());
    }

    #[tokio::test]
    async fn test_get_commit_splits_author() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/commit/abc"),
            200,
            &json!({
                "hash": "abc",
                "author": {"raw": "Ada Lovelace <ada@example.com>"},
                "date": "2024-01-01T00:00:00+00:00",
                "message": "Initial\n",
                "parents": [{"hash": "def"}],
                "links": {"html": {"href": "https://bitbucket.org/acme/widgets/commits/abc"}}
            }),
        );

        let commit = client(&transport)
            .get_commit(&CallContext::new(), "acme", "widgets", "abc")
            .await
            .unwrap();
        assert_eq!(commit.author_name, "Ada Lovelace");
        assert_eq!(commit.author_email, "ada@example.com");
        assert_eq!(commit.committer_name, "Ada Lovelace");
        assert_eq!(commit.timestamp, 1_704_067_200);
        assert_eq!(commit.parents, vec!["def"]);
    }

    #[tokio::test]
    async fn test_get_pull_request_from_fork() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/pullrequests/5"),
            200,
            &pull_json(json!({"full_name": "ada/widgets"})),
        );

        let pr = client(&transport)
            .get_pull_request(&CallContext::new(), "acme", "widgets", 5)
            .await
            .unwrap();
        assert_eq!(pr.source_owner, "ada");
        assert_eq!(pr.target_owner, "acme");
        assert_eq!(pr.author, "ada");
        assert_eq!(pr.state, PullRequestState::Merged);
    }

    #[tokio::test]
    async fn test_pull_request_with_deleted_fork_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/pullrequests/5"),
            200,
            &pull_json(serde_json::Value::Null),
        );

        let err = client(&transport)
            .get_pull_request(&CallContext::new(), "acme", "widgets", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_list_comments_skips_deleted() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/pullrequests/5/comments?pagelen=100&page=1"),
            200,
            &json!({"values": [
                {"id": 1, "content": {"raw": "Why?"}, "created_on": "2024-01-01T00:00:00Z"},
                {"id": 2, "content": {"raw": ""}, "created_on": "2024-01-01T00:01:00Z", "deleted": true},
                {"id": 3, "content": {"raw": "Because"}, "created_on": "2024-01-01T00:02:00Z", "parent": {"id": 1}}
            ]}),
        );

        let comments = client(&transport)
            .list_pull_request_comments(&CallContext::new(), "acme", "widgets", 5)
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].thread_id.as_deref(), Some("1"));
        assert_eq!(comments[1].content, "Because");
    }

    #[tokio::test]
    async fn test_write_deploy_key_is_unsupported() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .add_deploy_key(&CallContext::new(), "acme", "widgets", "ci", "ssh-ed25519 AAAA", Permission::ReadWrite)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScmError::Unsupported {
                provider: ProviderKind::BitbucketCloud,
                capability: Capability::WriteDeployKeys
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_read_deploy_key() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, format!("{REPO}/deploy-keys"), 200, &json!({"id": 123}));

        let id = client(&transport)
            .add_deploy_key(&CallContext::new(), "acme", "widgets", "ci", "ssh-ed25519 AAAA", Permission::Read)
            .await
            .unwrap();
        assert_eq!(id, "123");
    }

    #[tokio::test]
    async fn test_labels_unsupported() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .list_labels(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_environments() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{REPO}/environments/?pagelen=100&page=1"),
            200,
            &json!({"values": [{"name": "Test"}, {"name": "Production"}]}),
        );

        let environments = client(&transport)
            .list_environments(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap();
        let names: Vec<&str> = environments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Test", "Production"]);
    }

    #[tokio::test]
    async fn test_download_writes_marker() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, REPO, 200, &repo_json());
        transport.push_response(
            HttpMethod::Get,
            "https://bitbucket.org/acme/widgets/get/main.tar.gz",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: test_tarball(&[("acme-widgets-0123abc/src/lib.rs", "")]),
            },
        );
        let dir = tempfile::tempdir().unwrap();

        client(&transport)
            .download_repository(&CallContext::new(), "acme", "widgets", "main", dir.path(), &TarGzExtractor)
            .await
            .unwrap();

        assert!(dir.path().join("src/lib.rs").exists());
        let marker: RemoteMarker =
            serde_json::from_slice(&std::fs::read(dir.path().join(MARKER_FILE)).unwrap()).unwrap();
        assert_eq!(marker.provider, ProviderKind::BitbucketCloud);
        assert_eq!(marker.ssh_clone_url, "git@bitbucket.org:acme/widgets.git");
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_is_retried_then_surfaces() {
        let transport = MockTransport::new();
        for _ in 0..3 {
            transport.push_json(HttpMethod::Get, REPO, 429, &json!({"type": "error", "error": {"message": "Rate limit exceeded"}}));
        }

        let err = client(&transport)
            .get_repository_info(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        // Two retries: three attempts in total.
        assert_eq!(transport.requests().len(), 3);
    }
}
