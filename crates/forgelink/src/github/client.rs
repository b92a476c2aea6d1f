//! GitHub adapter.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{
    encode_sarif, events_to_github, read_only, status_from_github, status_to_github,
    to_comment_info, to_commit_info, to_label_info, to_pull_request_info, to_repository_info,
    visibility_to_github,
};
use super::error::classify;
use super::types::{
    ACCEPT, API_VERSION, GhBranch, GhComment, GhCommit, GhCreateRepo, GhDeployKeyRequest,
    GhEnvironments, GhHookConfig, GhHookRequest, GhId, GhLabel, GhPull, GhPullRequest, GhRepo,
    GhSarifReceipt, GhSarifUpload, GhStatus, GhStatusRequest, GhUser,
};
use crate::archive::ArchiveExtractor;
use crate::context::CallContext;
use crate::http::{HttpMethod, HttpTransport};
use crate::pagination::{PAGE_SIZE, Page, collect_pages, github_next_page};
use crate::platform::{
    CommentInfo, CommitInfo, CommitStatusInfo, ConnectionConfig, EnvironmentInfo, LabelInfo,
    NewCommitStatus, NewPullRequest, Op, Permission, ProviderKind, PullRequestInfo,
    RepositoryInfo, RepositoryListing, Result, ScmClient, ScmError, Visibility, WebhookEvent,
    WebhookHandle, add_owner_repos, normalize_color, parse_numeric_id, require,
};
use crate::rest::{RestClient, authorization_header, decode, encode};
use crate::retry::RetryPolicy;
use crate::secret::generate_token;

/// GitHub (github.com or GitHub Enterprise Server) client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    rest: RestClient,
    scope: Option<String>,
}

impl GitHubClient {
    /// Create a client for `config.api_url` (default `https://api.github.com`).
    ///
    /// For GitHub Enterprise Server use `https://<host>/api/v3`.
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let base_url = config.resolved_api_url()?;
        let headers = vec![
            authorization_header(None, &config.token),
            ("Accept".to_string(), ACCEPT.to_string()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
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
        format!("/repos/{}/{}", encode(owner), encode(repo))
    }

    /// Fetch every page of a list endpoint that returns a JSON array.
    async fn paginate<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<Vec<T>> {
        self.paginate_wrapped(ctx, op, path, |items: Vec<T>| items)
            .await
    }

    /// Fetch every page of a list endpoint whose array sits inside a wrapper object.
    async fn paginate_wrapped<W, T, F>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
        unwrap: F,
    ) -> Result<Vec<T>>
    where
        W: DeserializeOwned,
        F: Fn(W) -> Vec<T>,
    {
        let sep = if path.contains('?') { '&' } else { '?' };
        let unwrap = &unwrap;
        collect_pages(op, 1u32, |page| async move {
            let url = format!("{path}{sep}per_page={PAGE_SIZE}&page={page}");
            let (body, headers): (W, _) = self.rest.get_json_with_headers(ctx, op, &url).await?;
            Ok(Page::new(unwrap(body), github_next_page(&headers)))
        })
        .await
    }

    async fn authenticated_user(&self, ctx: &CallContext, op: &Op) -> Result<GhUser> {
        self.rest.get_json(ctx, op, "/user").await
    }

    async fn owner_repos(
        &self,
        ctx: &CallContext,
        op: &Op,
        owner: &str,
        login: &str,
    ) -> Result<Vec<GhRepo>> {
        if owner == login {
            return self.paginate(ctx, op, "/user/repos?affiliation=owner").await;
        }
        match self
            .paginate(ctx, op, &format!("/orgs/{}/repos", encode(owner)))
            .await
        {
            Err(e) if e.is_not_found() => {
                self.paginate(ctx, op, &format!("/users/{}/repos", encode(owner)))
                    .await
            }
            other => other,
        }
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
        let body = GhHookRequest {
            name: (method == HttpMethod::Post).then_some("web"),
            active: true,
            events: events_to_github(events),
            config: GhHookConfig {
                url,
                content_type: "json",
                secret: &token,
                insecure_ssl: "0",
            },
        };
        let response = self.rest.send_body(ctx, op, method, path, &body).await?;
        let hook: GhId = decode(op, &response)?;
        Ok(WebhookHandle {
            id: hook.id.to_string(),
            token,
        })
    }
}

#[async_trait]
impl ScmClient for GitHubClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn test_connection(&self, ctx: &CallContext) -> Result<()> {
        let op = Op::new("test connection", self.rest.base_url());
        let user = self.authenticated_user(ctx, &op).await?;
        tracing::debug!("Connected to GitHub as {}", user.login);
        Ok(())
    }

    async fn list_repositories(&self, ctx: &CallContext) -> Result<RepositoryListing> {
        let op = Op::new("list repositories", self.scope.as_deref().unwrap_or("*"));
        let me = self.authenticated_user(ctx, &op).await?;

        let owners: Vec<String> = match &self.scope {
            Some(scope) => vec![scope.clone()],
            None => {
                let orgs: Vec<GhUser> = self.paginate(ctx, &op, "/user/orgs").await?;
                std::iter::once(me.login.clone())
                    .chain(orgs.into_iter().map(|o| o.login))
                    .collect()
            }
        };

        let mut listing = RepositoryListing::new();
        for owner in owners {
            let repos = self.owner_repos(ctx, &op, &owner, &me.login).await?;
            add_owner_repos(
                &mut listing,
                &owner,
                repos.into_iter().map(|r| r.name).collect(),
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
        let branches: Vec<GhBranch> = self
            .paginate(ctx, &op, &format!("{}/branches", Self::repo_path(owner, repo)))
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
        let gh: GhRepo = self
            .rest
            .get_json(ctx, &op, &Self::repo_path(owner, repo))
            .await?;
        Ok(to_repository_info(&gh))
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
        let me = self.authenticated_user(ctx, &op).await?;
        let path = if me.login == owner {
            "/user/repos".to_string()
        } else {
            format!("/orgs/{}/repos", encode(owner))
        };
        let body = GhCreateRepo {
            name: repo,
            private: visibility != Visibility::Public,
            visibility: visibility_to_github(visibility),
        };
        let gh: GhRepo = self.rest.post_json(ctx, &op, &path, &body).await?;
        Ok(to_repository_info(&gh))
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
        let id = parse_numeric_id("webhook id", id)?;
        let op = Op::repo("update webhook", owner, repo);
        let path = format!("{}/hooks/{id}", Self::repo_path(owner, repo));
        self.send_webhook(ctx, &op, HttpMethod::Patch, &path, url, events)
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
                &format!("{}/hooks/{id}", Self::repo_path(owner, repo)),
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
        let body = GhStatusRequest {
            state: status_to_github(status.state),
            context: &status.context,
            description: &status.description,
            target_url: status.target_url.as_deref(),
        };
        self.rest
            .send_body(
                ctx,
                &op,
                HttpMethod::Post,
                &format!("{}/statuses/{}", Self::repo_path(owner, repo), encode(sha)),
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
        let statuses: Vec<GhStatus> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/commits/{}/statuses", Self::repo_path(owner, repo), encode(sha)),
            )
            .await?;
        Ok(statuses
            .into_iter()
            .map(|s| CommitStatusInfo {
                state: status_from_github(&s.state),
                context: s.context,
                description: s.description.unwrap_or_default(),
                target_url: s.target_url,
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
        let commit: GhCommit = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/commits/{}", Self::repo_path(owner, repo), encode(sha)),
            )
            .await
            .map_err(|e| match e {
                // "No commit found for SHA" comes back as 422.
                ScmError::Remote { status: 422, .. } => op.not_found(),
                other => other,
            })?;
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
        let body = GhPullRequest {
            title: &pr.title,
            body: &pr.body,
            head: &pr.source_branch,
            base: &pr.target_branch,
        };
        let pull: GhPull = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/pulls", Self::repo_path(owner, repo)),
                &body,
            )
            .await?;
        to_pull_request_info(&op, pull)
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
        let pull: GhPull = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/pulls/{id}", Self::repo_path(owner, repo)),
            )
            .await?;
        to_pull_request_info(&op, pull)
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
        let comment: GhComment = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/issues/{id}/comments", Self::repo_path(owner, repo)),
                &serde_json::json!({ "body": body }),
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
        let comments: Vec<GhComment> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/issues/{id}/comments", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(comments.into_iter().map(to_comment_info).collect())
    }

    async fn list_labels(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("list labels", owner, repo);
        let labels: Vec<GhLabel> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/labels", Self::repo_path(owner, repo)),
            )
            .await?;
        Ok(labels.into_iter().map(to_label_info).collect())
    }

    async fn get_label(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo), ("label", name)])?;
        let labels = self.list_labels(ctx, owner, repo).await?;
        Ok(labels.into_iter().find(|l| l.name == name))
    }

    async fn create_label(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        label: &LabelInfo,
    ) -> Result<LabelInfo> {
        require(&[("owner", owner), ("repository", repo), ("label", &label.name)])?;
        let color = normalize_color(&label.color)?;
        let op = Op::repo("create label", owner, repo);
        let body = GhLabel {
            name: label.name.clone(),
            description: Some(label.description.clone()),
            color,
        };
        let created: GhLabel = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/labels", Self::repo_path(owner, repo)),
                &body,
            )
            .await?;
        Ok(to_label_info(created))
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
        let body = GhDeployKeyRequest {
            title,
            key,
            read_only: read_only(permission),
        };
        let created: GhId = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/keys", Self::repo_path(owner, repo)),
                &body,
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
        let environments = self
            .paginate_wrapped(
                ctx,
                &op,
                &format!("{}/environments", Self::repo_path(owner, repo)),
                |page: GhEnvironments| page.environments,
            )
            .await?;
        Ok(environments
            .into_iter()
            .map(|e| EnvironmentInfo {
                name: e.name,
                url: e.html_url,
            })
            .collect())
    }

    async fn upload_code_scanning(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        sha: &str,
        git_ref: &str,
        sarif: &[u8],
    ) -> Result<String> {
        require(&[
            ("owner", owner),
            ("repository", repo),
            ("sha", sha),
            ("ref", git_ref),
        ])?;
        if sarif.is_empty() {
            return Err(ScmError::invalid("sarif", "document is empty"));
        }
        let op = Op::repo("upload code scanning", owner, repo);
        let body = GhSarifUpload {
            commit_sha: sha,
            git_ref,
            sarif: encode_sarif(sarif).map_err(|e| ScmError::invalid("sarif", e.to_string()))?,
        };
        let receipt: GhSarifReceipt = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/code-scanning/sarifs", Self::repo_path(owner, repo)),
                &body,
            )
            .await?;
        Ok(receipt.id)
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
        let op = Op::repo("download repository", owner, repo);
        let bytes = self
            .rest
            .get_bytes(
                ctx,
                &op,
                &format!("{}/tarball/{}", Self::repo_path(owner, repo), encode(git_ref)),
            )
            .await?;
        // Tarballs wrap everything in `<owner>-<repo>-<sha>/`.
        extractor.extract(&bytes, dest, 1)?;
        Ok(())
    }
}
