//! Vocabulary mapping and model conversion for Bitbucket Server.

use super::types::{BbsComment, BbsCommit, BbsPullRequest, BbsRepository};
use crate::platform::{
    CommentInfo, CommitInfo, CommitStatus, Op, Permission, PullRequestInfo, PullRequestState,
    RepositoryInfo, Result, Visibility, WebhookEvent, dedup_first_seen, from_epoch_millis,
};

/// Every webhook event key this adapter can register.
pub const KNOWN_EVENTS: &[&str] = &[
    "pr:opened",
    "pr:modified",
    "pr:merged",
    "pr:declined",
    "pr:comment:added",
    "repo:refs_changed",
];

pub fn status_to_bitbucket(status: CommitStatus) -> &'static str {
    match status {
        CommitStatus::Pass => "SUCCESSFUL",
        CommitStatus::Fail | CommitStatus::Error => "FAILED",
        CommitStatus::InProgress => "INPROGRESS",
    }
}

/// `STOPPED`, `CANCELLED` and anything unrecognized fold to Error.
pub fn status_from_bitbucket(state: &str) -> CommitStatus {
    match state {
        "SUCCESSFUL" => CommitStatus::Pass,
        "FAILED" => CommitStatus::Fail,
        "INPROGRESS" => CommitStatus::InProgress,
        _ => CommitStatus::Error,
    }
}

fn event_to_bitbucket(event: WebhookEvent) -> &'static str {
    match event {
        WebhookEvent::PrOpened => "pr:opened",
        WebhookEvent::PrEdited => "pr:modified",
        WebhookEvent::PrMerged => "pr:merged",
        WebhookEvent::PrRejected => "pr:declined",
        WebhookEvent::PrCommented => "pr:comment:added",
        WebhookEvent::Push | WebhookEvent::TagPushed | WebhookEvent::TagRemoved => {
            "repo:refs_changed"
        }
    }
}

pub fn events_to_bitbucket(events: &[WebhookEvent]) -> Vec<&'static str> {
    dedup_first_seen(events.iter().copied().map(event_to_bitbucket))
}

/// Bitbucket Server only knows public or not; Internal becomes private.
pub fn is_public(visibility: Visibility) -> bool {
    matches!(visibility, Visibility::Public)
}

pub fn visibility_from_public(public: bool) -> Visibility {
    if public {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

pub fn permission_to_bitbucket(permission: Permission) -> &'static str {
    match permission {
        Permission::Read => "REPO_READ",
        Permission::ReadWrite => "REPO_WRITE",
    }
}

pub fn pull_request_state(state: &str) -> PullRequestState {
    match state {
        "OPEN" => PullRequestState::Open,
        "MERGED" => PullRequestState::Merged,
        _ => PullRequestState::Closed,
    }
}

/// Qualify a bare branch name as `refs/heads/<name>`.
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

pub fn to_repository_info(repo: &BbsRepository) -> RepositoryInfo {
    let clone_url = |names: &[&str]| {
        repo.links
            .clone
            .iter()
            .find(|l| l.name.as_deref().is_some_and(|n| names.contains(&n)))
            .map(|l| l.href.clone())
            .unwrap_or_default()
    };

    RepositoryInfo {
        http_clone_url: clone_url(&["http", "https"]),
        ssh_clone_url: clone_url(&["ssh"]),
        visibility: visibility_from_public(repo.public),
    }
}

/// `web_url` is the commit's page in the Bitbucket UI.
pub fn to_commit_info(op: &Op, commit: BbsCommit, web_url: String) -> Result<CommitInfo> {
    let timestamp = from_epoch_millis(op, commit.author_timestamp)?.timestamp();
    Ok(CommitInfo {
        hash: commit.id,
        author_name: commit.author.name,
        author_email: commit.author.email_address.unwrap_or_default(),
        committer_name: commit.committer.name,
        url: web_url,
        timestamp,
        message: commit.message,
        parents: commit.parents.into_iter().map(|p| p.id).collect(),
    })
}

pub fn to_comment_info(
    op: &Op,
    comment: &BbsComment,
    thread_id: Option<String>,
) -> Result<CommentInfo> {
    Ok(CommentInfo {
        id: comment.id.to_string(),
        thread_id,
        content: comment.text.clone(),
        created_at: from_epoch_millis(op, comment.created_date)?,
        version: Some(comment.version),
    })
}

/// Flatten a root comment and its replies depth-first. Replies carry the
/// root comment's id as their thread.
pub fn flatten_comment(op: &Op, root: &BbsComment, out: &mut Vec<CommentInfo>) -> Result<()> {
    let thread = root.id.to_string();
    out.push(to_comment_info(op, root, None)?);

    let mut pending: Vec<&BbsComment> = root.comments.iter().rev().collect();
    while let Some(reply) = pending.pop() {
        out.push(to_comment_info(op, reply, Some(thread.clone()))?);
        pending.extend(reply.comments.iter().rev());
    }
    Ok(())
}

pub fn to_pull_request_info(pr: BbsPullRequest) -> PullRequestInfo {
    PullRequestInfo {
        id: pr.id,
        title: pr.title,
        body: pr.description.unwrap_or_default(),
        url: pr
            .links
            .self_links
            .into_iter()
            .next()
            .map(|l| l.href)
            .unwrap_or_default(),
        author: pr.author.user.slug.unwrap_or(pr.author.user.name),
        source_branch: pr.from_ref.display_id,
        source_repo: pr.from_ref.repository.slug,
        source_owner: pr.from_ref.repository.project.key,
        target_branch: pr.to_ref.display_id,
        target_repo: pr.to_ref.repository.slug,
        target_owner: pr.to_ref.repository.project.key,
        state: pull_request_state(&pr.state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_to_bitbucket(CommitStatus::Error), "FAILED");
        assert_eq!(status_from_bitbucket("FAILED"), CommitStatus::Fail);
        assert_eq!(status_from_bitbucket("INPROGRESS"), CommitStatus::InProgress);
        assert_eq!(status_from_bitbucket("STOPPED"), CommitStatus::Error);
        assert_eq!(status_from_bitbucket("CANCELLED"), CommitStatus::Error);
        for status in [CommitStatus::Pass, CommitStatus::Fail, CommitStatus::InProgress] {
            assert_eq!(status_from_bitbucket(status_to_bitbucket(status)), status);
        }
    }

    #[test]
    fn test_push_and_tag_events_collapse() {
        assert_eq!(
            events_to_bitbucket(&[
                WebhookEvent::Push,
                WebhookEvent::TagPushed,
                WebhookEvent::PrMerged,
                WebhookEvent::TagRemoved
            ]),
            vec!["repo:refs_changed", "pr:merged"]
        );
        let all = events_to_bitbucket(&WebhookEvent::ALL);
        assert_eq!(all.len(), KNOWN_EVENTS.len());
        assert!(all.iter().all(|e| KNOWN_EVENTS.contains(e)));
    }

    #[test]
    fn test_internal_visibility_is_not_public() {
        assert!(is_public(Visibility::Public));
        assert!(!is_public(Visibility::Internal));
        assert_eq!(visibility_from_public(false), Visibility::Private);
    }

    #[test]
    fn test_branch_ref() {
        assert_eq!(branch_ref("main"), "refs/heads/main");
        assert_eq!(branch_ref("refs/tags/v1"), "refs/tags/v1");
    }

    #[test]
    fn test_flatten_comment_threads_replies() {
        let root: BbsComment = serde_json::from_value(serde_json::json!({
            "id": 1,
            "version": 0,
            "text": "Why?",
            "createdDate": 1_704_067_200_000_i64,
            "comments": [
                {
                    "id": 2, "version": 1, "text": "Because", "createdDate": 1_704_067_260_000_i64,
                    "comments": [
                        {"id": 4, "version": 0, "text": "Ok", "createdDate": 1_704_067_320_000_i64}
                    ]
                },
                {"id": 3, "version": 0, "text": "+1", "createdDate": 1_704_067_380_000_i64}
            ]
        }))
        .unwrap();

        let mut out = Vec::new();
        flatten_comment(&Op::new("list comments", "x"), &root, &mut out).unwrap();

        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4", "3"]);
        assert_eq!(out[0].thread_id, None);
        assert!(out[1..].iter().all(|c| c.thread_id.as_deref() == Some("1")));
        assert_eq!(out[1].version, Some(1));
        assert_eq!(out[0].created_at.timestamp(), 1_704_067_200);
    }
}
