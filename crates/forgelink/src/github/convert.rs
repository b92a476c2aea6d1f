//! Vocabulary mapping and model conversion for GitHub.

use std::io::Write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::write::GzEncoder;

use super::types::{GhComment, GhCommit, GhLabel, GhPull, GhPullRef, GhRepo};
use crate::platform::{
    CommentInfo, CommitInfo, CommitStatus, LabelInfo, Op, Permission, PullRequestInfo,
    PullRequestState, RepositoryInfo, Result, Visibility, WebhookEvent, dedup_first_seen,
    parse_timestamp,
};

/// Every webhook event name this adapter can emit.
pub const KNOWN_EVENTS: &[&str] = &["pull_request", "issue_comment", "push", "create", "delete"];

pub fn status_to_github(status: CommitStatus) -> &'static str {
    match status {
        CommitStatus::Pass => "success",
        CommitStatus::Fail => "failure",
        CommitStatus::Error => "error",
        CommitStatus::InProgress => "pending",
    }
}

pub fn status_from_github(state: &str) -> CommitStatus {
    match state {
        "success" => CommitStatus::Pass,
        "failure" => CommitStatus::Fail,
        "pending" => CommitStatus::InProgress,
        _ => CommitStatus::Error,
    }
}

fn event_to_github(event: WebhookEvent) -> &'static str {
    match event {
        WebhookEvent::PrOpened
        | WebhookEvent::PrEdited
        | WebhookEvent::PrMerged
        | WebhookEvent::PrRejected => "pull_request",
        WebhookEvent::PrCommented => "issue_comment",
        WebhookEvent::Push => "push",
        WebhookEvent::TagPushed => "create",
        WebhookEvent::TagRemoved => "delete",
    }
}

/// Map normalized events to GitHub hook events, deduplicated in first-seen order.
pub fn events_to_github(events: &[WebhookEvent]) -> Vec<&'static str> {
    dedup_first_seen(events.iter().copied().map(event_to_github))
}

pub fn visibility_to_github(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Internal => "internal",
        Visibility::Private => "private",
    }
}

pub fn visibility_from_github(repo: &GhRepo) -> Visibility {
    match repo.visibility.as_deref() {
        Some("public") => Visibility::Public,
        Some("internal") => Visibility::Internal,
        Some("private") => Visibility::Private,
        _ if repo.private => Visibility::Private,
        _ => Visibility::Public,
    }
}

/// GitHub deploy keys carry a `read_only` flag.
pub fn read_only(permission: Permission) -> bool {
    matches!(permission, Permission::Read)
}

pub fn to_repository_info(repo: &GhRepo) -> RepositoryInfo {
    RepositoryInfo {
        http_clone_url: repo.clone_url.clone(),
        ssh_clone_url: repo.ssh_url.clone(),
        visibility: visibility_from_github(repo),
    }
}

pub fn to_commit_info(op: &Op, commit: GhCommit) -> Result<CommitInfo> {
    let timestamp = parse_timestamp(op, &commit.commit.author.date)?.timestamp();
    Ok(CommitInfo {
        hash: commit.sha,
        author_name: commit.commit.author.name,
        author_email: commit.commit.author.email,
        committer_name: commit.commit.committer.name,
        url: commit.html_url,
        timestamp,
        message: commit.commit.message,
        parents: commit.parents.into_iter().map(|p| p.sha).collect(),
    })
}

fn pull_ref_owner(op: &Op, side: &str, pull_ref: &GhPullRef) -> Result<(String, String)> {
    pull_ref
        .repo
        .as_ref()
        .map(|r| (r.owner.login.clone(), r.name.clone()))
        .ok_or_else(|| op.decode(format!("pull request {side} repository is unknown")))
}

pub fn to_pull_request_info(op: &Op, pull: GhPull) -> Result<PullRequestInfo> {
    let (source_owner, source_repo) = pull_ref_owner(op, "source", &pull.head)?;
    let (target_owner, target_repo) = pull_ref_owner(op, "target", &pull.base)?;
    let state = if pull.merged_at.is_some() {
        PullRequestState::Merged
    } else if pull.state == "open" {
        PullRequestState::Open
    } else {
        PullRequestState::Closed
    };

    Ok(PullRequestInfo {
        id: pull.number,
        title: pull.title,
        body: pull.body.unwrap_or_default(),
        url: pull.html_url,
        author: pull.user.login,
        source_branch: pull.head.branch,
        source_repo,
        source_owner,
        target_branch: pull.base.branch,
        target_repo,
        target_owner,
        state,
    })
}

pub fn to_comment_info(comment: GhComment) -> CommentInfo {
    CommentInfo {
        id: comment.id.to_string(),
        thread_id: None,
        content: comment.body,
        created_at: comment.created_at,
        version: None,
    }
}

pub fn to_label_info(label: GhLabel) -> LabelInfo {
    LabelInfo {
        name: label.name,
        description: label.description.unwrap_or_default(),
        color: label.color.to_ascii_lowercase(),
    }
}

/// Gzip and base64-encode a SARIF document, as the upload endpoint expects.
pub fn encode_sarif(sarif: &[u8]) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(sarif)?;
    Ok(BASE64.encode(encoder.finish()?))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn op() -> Op {
        Op::repo("get pull request", "acme", "widgets")
    }

    #[test]
    fn test_status_round_trip() {
        for status in CommitStatus::ALL {
            assert_eq!(status_from_github(status_to_github(status)), status);
        }
        assert_eq!(status_from_github("mystery"), CommitStatus::Error);
    }

    #[test]
    fn test_events_are_deduplicated_and_known() {
        let events = events_to_github(&WebhookEvent::ALL);
        assert_eq!(
            events,
            vec!["pull_request", "issue_comment", "push", "create", "delete"]
        );
        assert!(events.iter().all(|e| KNOWN_EVENTS.contains(e)));

        let events = events_to_github(&[
            WebhookEvent::PrMerged,
            WebhookEvent::Push,
            WebhookEvent::PrOpened,
        ]);
        assert_eq!(events, vec!["pull_request", "push"]);
        assert!(events_to_github(&[]).is_empty());
    }

    #[test]
    fn test_visibility_mapping() {
        let mut repo: GhRepo = serde_json::from_value(serde_json::json!({
            "name": "widgets",
            "owner": {"login": "acme"},
            "clone_url": "https://github.com/acme/widgets.git",
            "ssh_url": "git@github.com:acme/widgets.git",
            "private": true,
            "visibility": "internal"
        }))
        .unwrap();
        assert_eq!(visibility_from_github(&repo), Visibility::Internal);

        repo.visibility = None;
        assert_eq!(visibility_from_github(&repo), Visibility::Private);

        for v in [Visibility::Public, Visibility::Internal, Visibility::Private] {
            repo.visibility = Some(visibility_to_github(v).to_string());
            assert_eq!(visibility_from_github(&repo), v);
        }
    }

    #[test]
    fn test_read_only() {
        assert!(read_only(Permission::Read));
        assert!(!read_only(Permission::ReadWrite));
    }

    fn pull_json(head_repo: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "number": 7,
            "title": "Add widgets",
            "body": null,
            "html_url": "https://github.com/acme/widgets/pull/7",
            "user": {"login": "octocat"},
            "state": "closed",
            "merged_at": "2024-01-02T00:00:00Z",
            "head": {"ref": "feature", "repo": head_repo},
            "base": {"ref": "main", "repo": {"name": "widgets", "owner": {"login": "acme"}}}
        })
    }

    #[test]
    fn test_pull_request_resolves_fork_ownership() {
        let pull: GhPull = serde_json::from_value(pull_json(
            serde_json::json!({"name": "widgets-fork", "owner": {"login": "octocat"}}),
        ))
        .unwrap();
        let info = to_pull_request_info(&op(), pull).unwrap();
        assert_eq!(info.id, 7);
        assert_eq!(info.source_owner, "octocat");
        assert_eq!(info.source_repo, "widgets-fork");
        assert_eq!(info.target_owner, "acme");
        assert_eq!(info.state, PullRequestState::Merged);
        assert_eq!(info.body, "");
    }

    #[test]
    fn test_pull_request_without_source_repo_is_an_error() {
        let pull: GhPull = serde_json::from_value(pull_json(serde_json::Value::Null)).unwrap();
        let err = to_pull_request_info(&op(), pull).unwrap_err();
        assert!(err.to_string().contains("source repository"));
    }

    #[test]
    fn test_commit_conversion() {
        let commit: GhCommit = serde_json::from_value(serde_json::json!({
            "sha": "abc123",
            "html_url": "https://github.com/acme/widgets/commit/abc123",
            "commit": {
                "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-01-01T00:00:00Z"},
                "committer": {"name": "GitHub", "email": "noreply@github.com", "date": "2024-01-01T00:00:05Z"},
                "message": "Initial commit"
            },
            "parents": [{"sha": "p1"}, {"sha": "p2"}]
        }))
        .unwrap();
        let info = to_commit_info(&op(), commit).unwrap();
        assert_eq!(info.timestamp, 1_704_067_200);
        assert_eq!(info.committer_name, "GitHub");
        assert_eq!(info.parents, vec!["p1", "p2"]);
    }

    #[test]
    fn test_encode_sarif_is_gzip_base64() {
        let encoded = encode_sarif(br#"{"version":"2.1.0"}"#).unwrap();
        let compressed = BASE64.decode(encoded).unwrap();
        let mut decoded = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, r#"{"version":"2.1.0"}"#);
    }
}
