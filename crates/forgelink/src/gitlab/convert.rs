//! Vocabulary mapping and model conversion for GitLab.

use super::types::{GitLabCommit, GitLabLabel, GitLabNote, GitLabProject};
use crate::platform::{
    CommentInfo, CommitInfo, CommitStatus, LabelInfo, Op, Permission, PullRequestState,
    RepositoryInfo, Result, Visibility, WebhookEvent, dedup_first_seen, parse_timestamp,
};

/// Every project-hook event flag this adapter can enable.
pub const KNOWN_EVENTS: &[&str] = &[
    "merge_requests_events",
    "note_events",
    "push_events",
    "tag_push_events",
];

/// GitLab has no separate "error" state; Error and Fail both become `failed`.
pub fn status_to_gitlab(status: CommitStatus) -> &'static str {
    match status {
        CommitStatus::Pass => "success",
        CommitStatus::Fail | CommitStatus::Error => "failed",
        CommitStatus::InProgress => "running",
    }
}

pub fn status_from_gitlab(status: &str) -> CommitStatus {
    match status {
        "success" => CommitStatus::Pass,
        "failed" => CommitStatus::Fail,
        "pending" | "created" | "running" => CommitStatus::InProgress,
        // canceled, skipped and anything newer
        _ => CommitStatus::Error,
    }
}

fn event_to_gitlab(event: WebhookEvent) -> &'static str {
    match event {
        WebhookEvent::PrOpened
        | WebhookEvent::PrEdited
        | WebhookEvent::PrMerged
        | WebhookEvent::PrRejected => "merge_requests_events",
        WebhookEvent::PrCommented => "note_events",
        WebhookEvent::Push => "push_events",
        WebhookEvent::TagPushed | WebhookEvent::TagRemoved => "tag_push_events",
    }
}

/// Map normalized events to project-hook flags, deduplicated in first-seen order.
pub fn events_to_gitlab(events: &[WebhookEvent]) -> Vec<&'static str> {
    dedup_first_seen(events.iter().copied().map(event_to_gitlab))
}

pub fn visibility_to_gitlab(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Internal => "internal",
        Visibility::Private => "private",
    }
}

/// GitLab has three visibility levels: public, private, and internal. A
/// missing or unknown level is reported as private.
pub fn visibility_from_gitlab(visibility: Option<&str>) -> Visibility {
    match visibility {
        Some("public") => Visibility::Public,
        Some("internal") => Visibility::Internal,
        _ => Visibility::Private,
    }
}

pub fn can_push(permission: Permission) -> bool {
    matches!(permission, Permission::ReadWrite)
}

pub fn merge_request_state(state: &str) -> PullRequestState {
    match state {
        "opened" | "locked" => PullRequestState::Open,
        "merged" => PullRequestState::Merged,
        _ => PullRequestState::Closed,
    }
}

/// Split `group/subgroup/project` into (`group/subgroup`, `project`).
pub fn split_project_path(op: &Op, path_with_namespace: &str) -> Result<(String, String)> {
    path_with_namespace
        .rsplit_once('/')
        .map(|(ns, name)| (ns.to_string(), name.to_string()))
        .ok_or_else(|| op.decode(format!("project path {path_with_namespace:?} has no namespace")))
}

pub fn to_repository_info(project: &GitLabProject) -> RepositoryInfo {
    RepositoryInfo {
        http_clone_url: project.http_url_to_repo.clone().unwrap_or_default(),
        ssh_clone_url: project.ssh_url_to_repo.clone().unwrap_or_default(),
        visibility: visibility_from_gitlab(project.visibility.as_deref()),
    }
}

pub fn to_commit_info(op: &Op, commit: GitLabCommit) -> Result<CommitInfo> {
    let timestamp = parse_timestamp(op, &commit.authored_date)?.timestamp();
    Ok(CommitInfo {
        hash: commit.id,
        author_name: commit.author_name,
        author_email: commit.author_email,
        committer_name: commit.committer_name,
        url: commit.web_url,
        timestamp,
        message: commit.message,
        parents: commit.parent_ids,
    })
}

pub fn to_comment_info(note: GitLabNote) -> CommentInfo {
    CommentInfo {
        id: note.id.to_string(),
        thread_id: None,
        content: note.body,
        created_at: note.created_at,
        version: None,
    }
}

pub fn to_label_info(label: GitLabLabel) -> LabelInfo {
    LabelInfo {
        name: label.name,
        description: label.description.unwrap_or_default(),
        color: label.color.trim_start_matches('#').to_ascii_lowercase(),
    }
}
