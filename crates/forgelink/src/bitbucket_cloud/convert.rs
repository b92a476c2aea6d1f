//! Vocabulary mapping and model conversion for Bitbucket Cloud.

use uuid::Uuid;

use super::types::{BbcComment, BbcCommit, BbcEndpoint, BbcPullRequest, BbcRepository};
use crate::platform::{
    CommentInfo, CommitInfo, CommitStatus, Op, PullRequestInfo, PullRequestState, RepositoryInfo,
    Result, ScmError, Visibility, WebhookEvent, dedup_first_seen, parse_timestamp,
};

/// Every webhook event key this adapter can register.
pub const KNOWN_EVENTS: &[&str] = &[
    "pullrequest:created",
    "pullrequest:updated",
    "pullrequest:fulfilled",
    "pullrequest:rejected",
    "pullrequest:comment_created",
    "repo:push",
];

pub fn status_to_bitbucket(status: CommitStatus) -> &'static str {
    match status {
        CommitStatus::Pass => "SUCCESSFUL",
        CommitStatus::Fail | CommitStatus::Error => "FAILED",
        CommitStatus::InProgress => "INPROGRESS",
    }
}

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
        WebhookEvent::PrOpened => "pullrequest:created",
        WebhookEvent::PrEdited => "pullrequest:updated",
        WebhookEvent::PrMerged => "pullrequest:fulfilled",
        WebhookEvent::PrRejected => "pullrequest:rejected",
        WebhookEvent::PrCommented => "pullrequest:comment_created",
        WebhookEvent::Push | WebhookEvent::TagPushed | WebhookEvent::TagRemoved => "repo:push",
    }
}

pub fn events_to_bitbucket(events: &[WebhookEvent]) -> Vec<&'static str> {
    dedup_first_seen(events.iter().copied().map(event_to_bitbucket))
}

/// Cloud repositories are private or not; Internal becomes private.
pub fn is_private(visibility: Visibility) -> bool {
    !matches!(visibility, Visibility::Public)
}

pub fn visibility_from_private(is_private: bool) -> Visibility {
    if is_private {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

/// Parse a webhook id given as a braced (`{...}`) or bare UUID.
pub fn parse_webhook_id(id: &str) -> Result<Uuid> {
    let trimmed = id.trim();
    let bare = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    Uuid::parse_str(bare)
        .map_err(|e| ScmError::invalid("webhook id", format!("{id:?} is not a UUID: {e}")))
}

/// The braced form the hooks endpoint expects in its path.
pub fn braced(id: Uuid) -> String {
    format!("{{{id}}}")
}

/// Split a commit author's `Name <email>`.
pub fn split_author(raw: &str) -> (String, String) {
    match raw.rsplit_once('<') {
        Some((name, rest)) => (
            name.trim().to_string(),
            rest.trim_end().trim_end_matches('>').trim().to_string(),
        ),
        None => (raw.trim().to_string(), String::new()),
    }
}

pub fn pull_request_state(state: &str) -> PullRequestState {
    match state {
        "OPEN" => PullRequestState::Open,
        "MERGED" => PullRequestState::Merged,
        _ => PullRequestState::Closed,
    }
}

pub fn to_repository_info(repo: &BbcRepository) -> RepositoryInfo {
    let clone_url = |name: &str| {
        repo.links
            .clone
            .iter()
            .find(|l| l.name.as_deref() == Some(name))
            .map(|l| l.href.clone())
            .unwrap_or_default()
    };

    RepositoryInfo {
        http_clone_url: clone_url("https"),
        ssh_clone_url: clone_url("ssh"),
        visibility: visibility_from_private(repo.is_private),
    }
}

/// Commits only record an author; it doubles as the committer.
pub fn to_commit_info(op: &Op, commit: BbcCommit) -> Result<CommitInfo> {
    let timestamp = parse_timestamp(op, &commit.date)?.timestamp();
    let (author_name, author_email) = split_author(&commit.author.raw);
    Ok(CommitInfo {
        hash: commit.hash,
        committer_name: author_name.clone(),
        author_name,
        author_email,
        url: commit.links.html.href,
        timestamp,
        message: commit.message,
        parents: commit.parents.into_iter().map(|p| p.hash).collect(),
    })
}

pub fn to_comment_info(comment: BbcComment) -> CommentInfo {
    CommentInfo {
        id: comment.id.to_string(),
        thread_id: comment.parent.map(|p| p.id.to_string()),
        content: comment.content.raw,
        created_at: comment.created_on,
        version: None,
    }
}

fn endpoint_owner(op: &Op, endpoint: &BbcEndpoint, side: &str) -> Result<(String, String)> {
    let full_name = endpoint
        .repository
        .as_ref()
        .map(|r| r.full_name.as_str())
        .ok_or_else(|| op.decode(format!("pull request {side} repository is unknown")))?;
    full_name
        .split_once('/')
        .map(|(w, r)| (w.to_string(), r.to_string()))
        .ok_or_else(|| op.decode(format!("repository name {full_name:?} has no workspace")))
}

pub fn to_pull_request_info(op: &Op, pr: BbcPullRequest) -> Result<PullRequestInfo> {
    let (source_owner, source_repo) = endpoint_owner(op, &pr.source, "source")?;
    let (target_owner, target_repo) = endpoint_owner(op, &pr.destination, "destination")?;

    Ok(PullRequestInfo {
        id: pr.id,
        title: pr.title,
        body: pr.description.unwrap_or_default(),
        url: pr.links.html.href,
        author: pr.author.nickname.unwrap_or(pr.author.display_name),
        source_branch: pr.source.branch.name,
        source_repo,
        source_owner,
        target_branch: pr.destination.branch.name,
        target_repo,
        target_owner,
        state: pull_request_state(&pr.state),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_collapse_to_repo_push() {
        assert_eq!(
            events_to_bitbucket(&[
                WebhookEvent::TagRemoved,
                WebhookEvent::PrCommented,
                WebhookEvent::Push
            ]),
            vec!["repo:push", "pullrequest:comment_created"]
        );
        let all = events_to_bitbucket(&WebhookEvent::ALL);
        assert_eq!(all.len(), KNOWN_EVENTS.len());
        assert!(all.iter().all(|e| KNOWN_EVENTS.contains(e)));
    }

    #[test]
    fn test_status_reverse_mapping() {
        assert_eq!(status_from_bitbucket("STOPPED"), CommitStatus::Error);
        assert_eq!(status_from_bitbucket("SUCCESSFUL"), CommitStatus::Pass);
        assert_eq!(status_to_bitbucket(CommitStatus::Error), "FAILED");
    }

    #[test]
    fn test_parse_webhook_id_braced_or_bare() {
        let bare = "8a7b1c2d-0e4f-4a5b-9c6d-7e8f9a0b1c2d";
        let braced_id = format!("{{{bare}}}");

        assert_eq!(parse_webhook_id(bare).unwrap(), parse_webhook_id(&braced_id).unwrap());
        assert_eq!(braced(parse_webhook_id(bare).unwrap()), braced_id);

        let err = parse_webhook_id("42").unwrap_err();
        assert!(matches!(err, ScmError::InvalidArgument { name: "webhook id", .. }));
    }

    #[test]
    fn test_split_author() {
        assert_eq!(
            split_author("Ada Lovelace <ada@example.com>"),
            ("Ada Lovelace".to_string(), "ada@example.com".to_string())
        );
        assert_eq!(split_author("builder"), ("builder".to_string(), String::new()));
    }

    #[test]
    fn test_visibility() {
        assert!(is_private(Visibility::Internal));
        assert!(!is_private(Visibility::Public));
        assert_eq!(visibility_from_private(true), Visibility::Private);
    }
}
