//! GitLab adapter.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{
    can_push, events_to_gitlab, merge_request_state, split_project_path, status_from_gitlab,
    status_to_gitlab, to_comment_info, to_commit_info, to_label_info, to_repository_info,
    visibility_to_gitlab,
};
use super::error::classify;
use super::types::{
    GitLabBranch, GitLabCommit, GitLabCreateProject, GitLabDeployKeyRequest, GitLabEnvironment,
    GitLabHookRequest, GitLabId, GitLabLabel, GitLabLabelRequest, GitLabMergeRequest,
    GitLabMergeRequestCreate, GitLabNamespace, GitLabNote, GitLabProject, GitLabStatus,
    GitLabStatusRequest, GitLabUser, TOKEN_HEADER,
};
use crate::archive::ArchiveExtractor;
use crate::context::CallContext;
use crate::http::{HttpMethod, HttpTransport};
use crate::pagination::{PAGE_SIZE, Page, collect_pages, gitlab_next_page};
use crate::platform::{
    Capability, CommentInfo, CommitInfo, CommitStatusInfo, ConnectionConfig, EnvironmentInfo,
    LabelInfo, NewCommitStatus, NewPullRequest, Op, Permission, ProviderKind, PullRequestInfo,
    RepositoryInfo, RepositoryListing, Result, ScmClient, ScmError, Visibility, WebhookEvent,
    WebhookHandle, add_owner_repos, normalize_color, parse_numeric_id, require,
};
use crate::rest::{RestClient, decode, encode};
use crate::retry::RetryPolicy;
use crate::secret::generate_token;

/// GitLab (gitlab.com or self-managed) client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    rest: RestClient,
    scope: Option<String>,
}

impl GitLabClient {
    /// Create a client for `config.api_url` (default `https://gitlab.com/api/v4`).
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let base_url = config.resolved_api_url()?;
        let headers = vec![
            (TOKEN_HEADER.to_string(), config.token.clone()),
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

    /// `/projects/<url-encoded owner/repo>`.
    fn project_path(owner: &str, repo: &str) -> String {
        format!("/projects/{}", encode(&format!("{owner}/{repo}")))
    }

    async fn paginate<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        collect_pages(op, 1u32, |page| async move {
            let url = format!("{path}{sep}per_page={PAGE_SIZE}&page={page}");
            let (items, headers): (Vec<T>, _) =
                self.rest.get_json_with_headers(ctx, op, &url).await?;
            Ok(Page::new(items, gitlab_next_page(&headers, page)))
        })
        .await
    }

    async fn namespace(&self, ctx: &CallContext, op: &Op, path: &str) -> Result<GitLabNamespace> {
        self.rest
            .get_json(ctx, op, &format!("/namespaces/{}", encode(path)))
            .await
    }

    /// Resolve a project id to its (namespace, path).
    async fn project_owner(
        &self,
        ctx: &CallContext,
        op: &Op,
        id: Option<u64>,
        side: &str,
    ) -> Result<(String, String)> {
        let id = id.ok_or_else(|| op.decode(format!("merge request {side} project is unknown")))?;
        let project: GitLabProject = self
            .rest
            .get_json(ctx, op, &format!("/projects/{id}"))
            .await?;
        split_project_path(op, &project.path_with_namespace)
    }

    async fn to_pull_request_info(
        &self,
        ctx: &CallContext,
        op: &Op,
        mr: GitLabMergeRequest,
    ) -> Result<PullRequestInfo> {
        let (target_owner, target_repo) = self
            .project_owner(ctx, op, mr.target_project_id, "target")
            .await?;
        let (source_owner, source_repo) = if mr.source_project_id == mr.target_project_id {
            (target_owner.clone(), target_repo.clone())
        } else {
            self.project_owner(ctx, op, mr.source_project_id, "source")
                .await?
        };

        Ok(PullRequestInfo {
            id: mr.iid,
            title: mr.title,
            body: mr.description.unwrap_or_default(),
            url: mr.web_url,
            author: mr.author.username,
            source_branch: mr.source_branch,
            source_repo,
            source_owner,
            target_branch: mr.target_branch,
            target_repo,
            target_owner,
            state: merge_request_state(&mr.state),
        })
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
        let flags = events_to_gitlab(events);
        let body = GitLabHookRequest {
            url,
            token: &token,
            push_events: flags.contains(&"push_events"),
            tag_push_events: flags.contains(&"tag_push_events"),
            merge_requests_events: flags.contains(&"merge_requests_events"),
            note_events: flags.contains(&"note_events"),
            enable_ssl_verification: true,
        };
        let response = self.rest.send_body(ctx, op, method, path, &body).await?;
        let hook: GitLabId = decode(op, &response)?;
        Ok(WebhookHandle {
            id: hook.id.to_string(),
            token,
        })
    }
}

#[async_trait]
impl ScmClient for GitLabClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    async fn test_connection(&self, ctx: &CallContext) -> Result<()> {
        let op = Op::new("test connection", self.rest.base_url());
        let user: GitLabUser = self.rest.get_json(ctx, &op, "/user").await?;
        tracing::debug!("Connected to GitLab as {}", user.username);
        Ok(())
    }

    async fn list_repositories(&self, ctx: &CallContext) -> Result<RepositoryListing> {
        let op = Op::new("list repositories", self.scope.as_deref().unwrap_or("*"));
        let namespaces = match &self.scope {
            Some(scope) => vec![self.namespace(ctx, &op, scope).await?],
            None => self.paginate::<GitLabNamespace>(ctx, &op, "/namespaces").await?,
        };

        let mut listing = RepositoryListing::new();
        for ns in namespaces {
            let path = if ns.kind == "group" {
                format!("/groups/{}/projects", ns.id)
            } else {
                format!("/users/{}/projects", encode(&ns.path))
            };
            let projects: Vec<GitLabProject> = self.paginate(ctx, &op, &path).await?;
            add_owner_repos(
                &mut listing,
                &ns.full_path,
                projects.into_iter().map(|p| p.path).collect(),
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
        let branches: Vec<GitLabBranch> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/repository/branches", Self::project_path(owner, repo)),
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
        let project: GitLabProject = self
            .rest
            .get_json(ctx, &op, &Self::project_path(owner, repo))
            .await?;
        Ok(to_repository_info(&project))
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
        let ns = self.namespace(ctx, &op, owner).await?;
        let body = GitLabCreateProject {
            name: repo,
            path: repo,
            namespace_id: ns.id,
            visibility: visibility_to_gitlab(visibility),
        };
        let project: GitLabProject = self.rest.post_json(ctx, &op, "/projects", &body).await?;
        Ok(to_repository_info(&project))
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
        let path = format!("{}/hooks", Self::project_path(owner, repo));
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
        let path = format!("{}/hooks/{id}", Self::project_path(owner, repo));
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
                &format!("{}/hooks/{id}", Self::project_path(owner, repo)),
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
        let body = GitLabStatusRequest {
            state: status_to_gitlab(status.state),
            name: &status.context,
            description: &status.description,
            target_url: status.target_url.as_deref(),
        };
        self.rest
            .send_body(
                ctx,
                &op,
                HttpMethod::Post,
                &format!("{}/statuses/{sha}", Self::project_path(owner, repo)),
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
        let statuses: Vec<GitLabStatus> = self
            .paginate(
                ctx,
                &op,
                &format!(
                    "{}/repository/commits/{sha}/statuses",
                    Self::project_path(owner, repo)
                ),
            )
            .await?;
        Ok(statuses
            .into_iter()
            .map(|s| CommitStatusInfo {
                state: status_from_gitlab(&s.status),
                context: s.name,
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
        let commit: GitLabCommit = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/repository/commits/{sha}", Self::project_path(owner, repo)),
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
        let body = GitLabMergeRequestCreate {
            source_branch: &pr.source_branch,
            target_branch: &pr.target_branch,
            title: &pr.title,
            description: &pr.body,
        };
        let mr: GitLabMergeRequest = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/merge_requests", Self::project_path(owner, repo)),
                &body,
            )
            .await?;
        self.to_pull_request_info(ctx, &op, mr).await
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
        let mr: GitLabMergeRequest = self
            .rest
            .get_json(
                ctx,
                &op,
                &format!("{}/merge_requests/{id}", Self::project_path(owner, repo)),
            )
            .await?;
        self.to_pull_request_info(ctx, &op, mr).await
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
        let note: GitLabNote = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!(
                    "{}/merge_requests/{id}/notes",
                    Self::project_path(owner, repo)
                ),
                &serde_json::json!({ "body": body }),
            )
            .await?;
        Ok(to_comment_info(note))
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
        let notes: Vec<GitLabNote> = self
            .paginate(
                ctx,
                &op,
                &format!(
                    "{}/merge_requests/{id}/notes?sort=asc",
                    Self::project_path(owner, repo)
                ),
            )
            .await?;
        Ok(notes
            .into_iter()
            .filter(|n| !n.system)
            .map(to_comment_info)
            .collect())
    }

    async fn list_labels(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<LabelInfo>> {
        require(&[("owner", owner), ("repository", repo)])?;
        let op = Op::repo("list labels", owner, repo);
        let labels: Vec<GitLabLabel> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/labels", Self::project_path(owner, repo)),
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
        let body = GitLabLabelRequest {
            name: &label.name,
            color: format!("#{color}"),
            description: &label.description,
        };
        let created: GitLabLabel = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/labels", Self::project_path(owner, repo)),
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
        let body = GitLabDeployKeyRequest {
            title,
            key,
            can_push: can_push(permission),
        };
        let created: GitLabId = self
            .rest
            .post_json(
                ctx,
                &op,
                &format!("{}/deploy_keys", Self::project_path(owner, repo)),
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
        let environments: Vec<GitLabEnvironment> = self
            .paginate(
                ctx,
                &op,
                &format!("{}/environments", Self::project_path(owner, repo)),
            )
            .await?;
        Ok(environments
            .into_iter()
            .map(|e| EnvironmentInfo {
                name: e.name,
                url: e.external_url,
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
        Err(ScmError::unsupported(
            ProviderKind::GitLab,
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
        let op = Op::repo("download repository", owner, repo);
        let bytes = self
            .rest
            .get_bytes(
                ctx,
                &op,
                &format!(
                    "{}/repository/archive.tar.gz?sha={}",
                    Self::project_path(owner, repo),
                    encode(git_ref)
                ),
            )
            .await?;
        // Archives wrap everything in `<repo>-<ref>-<sha>/`.
        extractor.extract(&bytes, dest, 1)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::archive::{TarGzExtractor, test_tarball};
    use crate::http::{HttpHeaders, HttpResponse, MockTransport};
    use crate::platform::{CommitStatus, PullRequestState};

    const API: &str = "https://gitlab.com/api/v4";
    const PROJECT: &str = "https://gitlab.com/api/v4/projects/acme%2Fwidgets";

    fn client(transport: &MockTransport) -> GitLabClient {
        let config = ConnectionConfig::new(ProviderKind::GitLab, "glpat-test");
        GitLabClient::new(&config, Arc::new(transport.clone()))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(1)))
    }

    fn paged(total: u32, body: serde_json::Value) -> HttpResponse {
        let headers: HttpHeaders = vec![("X-Total-Pages".to_string(), total.to_string())];
        HttpResponse {
            status: 200,
            headers,
            body: body.to_string().into_bytes(),
        }
    }

    fn project_json(id: u64, path_with_namespace: &str) -> serde_json::Value {
        let path = path_with_namespace.rsplit('/').next().unwrap();
        json!({
            "id": id,
            "path": path,
            "path_with_namespace": path_with_namespace,
            "visibility": "internal",
            "ssh_url_to_repo": format!("git@gitlab.com:{path_with_namespace}.git"),
            "http_url_to_repo": format!("https://gitlab.com/{path_with_namespace}.git"),
        })
    }

    #[tokio::test]
    async fn test_sends_private_token_header() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, format!("{API}/user"), 200, &json!({"username": "ada"}));

        client(&transport)
            .test_connection(&CallContext::new())
            .await
            .unwrap();

        let headers = &transport.requests()[0].headers;
        assert!(headers.contains(&("PRIVATE-TOKEN".to_string(), "glpat-test".to_string())));
    }

    #[tokio::test]
    async fn test_get_repository_info_uses_encoded_project_id() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, PROJECT, 200, &project_json(17, "acme/widgets"));

        let info = client(&transport)
            .get_repository_info(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap();
        assert_eq!(info.visibility, Visibility::Internal);
        assert_eq!(info.http_clone_url, "https://gitlab.com/acme/widgets.git");
    }

    #[tokio::test]
    async fn test_create_webhook_sets_flags() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, format!("{PROJECT}/hooks"), 201, &json!({"id": 42}));

        let handle = client(&transport)
            .create_webhook(
                &CallContext::new(),
                "acme",
                "widgets",
                "https://ci.example.com/hook",
                &[WebhookEvent::TagRemoved, WebhookEvent::PrCommented],
            )
            .await
            .unwrap();
        assert_eq!(handle.id, "42");
        assert_eq!(handle.token.len(), 64);

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["token"], handle.token.as_str());
        assert_eq!(sent["tag_push_events"], true);
        assert_eq!(sent["note_events"], true);
        assert_eq!(sent["push_events"], false);
        assert_eq!(sent["merge_requests_events"], false);
    }

    #[tokio::test]
    async fn test_update_webhook_with_bad_id_sends_nothing() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .update_webhook(&CallContext::new(), "acme", "widgets", "hook-1", "https://x", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::InvalidArgument { name: "webhook id", .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_branches_uses_total_pages() {
        let transport = MockTransport::new();
        let base = format!("{PROJECT}/repository/branches?per_page=100");
        transport.push_response(HttpMethod::Get, format!("{base}&page=1"), paged(2, json!([{"name": "main"}])));
        transport.push_response(HttpMethod::Get, format!("{base}&page=2"), paged(2, json!([{"name": "dev"}])));

        let branches = client(&transport)
            .list_branches(&CallContext::new(), "acme", "widgets")
            .await
            .unwrap();
        assert_eq!(branches, vec!["main", "dev"]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_set_commit_status_maps_error_to_failed() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{PROJECT}/statuses/abc123"),
            201,
            &json!({"id": 1, "status": "failed"}),
        );

        client(&transport)
            .set_commit_status(
                &CallContext::new(),
                "acme",
                "widgets",
                "abc123",
                &NewCommitStatus {
                    state: CommitStatus::Error,
                    context: "ci/build".to_string(),
                    description: "crashed".to_string(),
                    target_url: Some("https://ci.example.com/1".to_string()),
                },
            )
            .await
            .unwrap();

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["state"], "failed");
        assert_eq!(sent["name"], "ci/build");
        assert_eq!(sent["target_url"], "https://ci.example.com/1");
    }

    #[tokio::test]
    async fn test_get_pull_request_resolves_fork_projects() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{PROJECT}/merge_requests/3"),
            200,
            &json!({
                "iid": 3,
                "title": "Faster widgets",
                "description": "Speeds things up",
                "web_url": "https://gitlab.com/acme/widgets/-/merge_requests/3",
                "author": {"username": "ada"},
                "source_branch": "perf",
                "target_branch": "main",
                "source_project_id": 99,
                "target_project_id": 17,
                "state": "merged"
            }),
        );
        transport.push_json(HttpMethod::Get, format!("{API}/projects/17"), 200, &project_json(17, "acme/widgets"));
        transport.push_json(HttpMethod::Get, format!("{API}/projects/99"), 200, &project_json(99, "ada/widgets"));

        let pr = client(&transport)
            .get_pull_request(&CallContext::new(), "acme", "widgets", 3)
            .await
            .unwrap();
        assert_eq!(pr.source_owner, "ada");
        assert_eq!(pr.target_owner, "acme");
        assert_eq!(pr.target_repo, "widgets");
        assert_eq!(pr.state, PullRequestState::Merged);
    }

    #[tokio::test]
    async fn test_pull_request_without_source_project_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{PROJECT}/merge_requests/4"),
            200,
            &json!({
                "iid": 4,
                "title": "Orphan",
                "web_url": "https://gitlab.com/acme/widgets/-/merge_requests/4",
                "author": {"username": "ada"},
                "source_branch": "gone",
                "target_branch": "main",
                "source_project_id": null,
                "target_project_id": 17,
                "state": "closed"
            }),
        );
        transport.push_json(HttpMethod::Get, format!("{API}/projects/17"), 200, &project_json(17, "acme/widgets"));

        let err = client(&transport)
            .get_pull_request(&CallContext::new(), "acme", "widgets", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_list_comments_skips_system_notes() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{PROJECT}/merge_requests/3/notes?sort=asc&per_page=100&page=1"),
            200,
            &json!([
                {"id": 1, "body": "added 1 commit", "created_at": "2024-01-01T00:00:00Z", "system": true},
                {"id": 2, "body": "Looks good", "created_at": "2024-01-01T01:00:00Z", "system": false}
            ]),
        );

        let comments = client(&transport)
            .list_pull_request_comments(&CallContext::new(), "acme", "widgets", 3)
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "2");
        assert_eq!(comments[0].content, "Looks good");
    }

    #[tokio::test]
    async fn test_create_label_sends_hash_prefixed_color() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{PROJECT}/labels"),
            201,
            &json!({"name": "bug", "description": "Broken", "color": "#d73a4a"}),
        );

        let label = client(&transport)
            .create_label(
                &CallContext::new(),
                "acme",
                "widgets",
                &LabelInfo {
                    name: "bug".to_string(),
                    description: "Broken".to_string(),
                    color: "D73A4A".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(label.color, "d73a4a");

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["color"], "#d73a4a");
    }

    #[tokio::test]
    async fn test_get_label_absent_returns_none() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{PROJECT}/labels?per_page=100&page=1"),
            200,
            &json!([]),
        );

        let label = client(&transport)
            .get_label(&CallContext::new(), "acme", "widgets", "bug")
            .await
            .unwrap();
        assert!(label.is_none());
    }

    #[tokio::test]
    async fn test_code_scanning_is_unsupported_without_request() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .upload_code_scanning(&CallContext::new(), "acme", "widgets", "abc", "refs/heads/main", b"{}")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScmError::Unsupported {
                provider: ProviderKind::GitLab,
                capability: Capability::CodeScanning
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_repositories_with_scope() {
        let transport = MockTransport::new();
        let config = ConnectionConfig::new(ProviderKind::GitLab, "glpat-test").with_scope("acme/platform");
        let client = GitLabClient::new(&config, Arc::new(transport.clone())).unwrap();

        transport.push_json(
            HttpMethod::Get,
            format!("{API}/namespaces/acme%2Fplatform"),
            200,
            &json!({"id": 5, "path": "platform", "full_path": "acme/platform", "kind": "group"}),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/groups/5/projects?per_page=100&page=1"),
            200,
            &json!([project_json(17, "acme/platform/widgets"), project_json(18, "acme/platform/gadgets")]),
        );

        let listing = client.list_repositories(&CallContext::new()).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["acme/platform"], vec!["widgets", "gadgets"]);
    }

    #[tokio::test]
    async fn test_download_repository() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{PROJECT}/repository/archive.tar.gz?sha=v1.0"),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: test_tarball(&[("widgets-v1.0-abc/Cargo.toml", "[package]")]),
            },
        );
        let dir = tempfile::tempdir().unwrap();

        client(&transport)
            .download_repository(&CallContext::new(), "acme", "widgets", "v1.0", dir.path(), &TarGzExtractor)
            .await
            .unwrap();
        assert!(dir.path().join("Cargo.toml").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_is_retried() {
        let transport = MockTransport::new();
        let url = format!("{PROJECT}/repository/commits/abc");
        transport.push_json(HttpMethod::Get, &url, 429, &json!({"message": "Retry later"}));
        transport.push_json(
            HttpMethod::Get,
            &url,
            200,
            &json!({
                "id": "abc",
                "author_name": "Ada",
                "author_email": "ada@example.com",
                "committer_name": "Ada",
                "web_url": "https://gitlab.com/acme/widgets/-/commit/abc",
                "authored_date": "2024-01-01T00:00:00.000+00:00",
                "message": "Initial",
                "parent_ids": []
            }),
        );

        let commit = client(&transport)
            .get_commit(&CallContext::new(), "acme", "widgets", "abc")
            .await
            .unwrap();
        assert_eq!(commit.timestamp, 1_704_067_200);
        assert_eq!(transport.requests().len(), 2);
    }
}
