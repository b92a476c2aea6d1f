use chrono::DateTime;
use clap::ValueEnum;
use console::style;
use serde::Serialize;

use forgelink::{
    CommentInfo, CommitInfo, CommitStatus, CommitStatusInfo, PullRequestInfo, PullRequestState,
    RepositoryInfo,
};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Print `value` as JSON, or hand it to `render` for text output.
pub(crate) fn emit<T, F>(
    value: &T,
    format: OutputFormat,
    render: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T),
{
    match format {
        OutputFormat::Text => render(value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

pub(crate) fn status_label(state: CommitStatus) -> String {
    match state {
        CommitStatus::Pass => style("pass").green().to_string(),
        CommitStatus::Fail => style("fail").red().to_string(),
        CommitStatus::Error => style("error").red().bold().to_string(),
        CommitStatus::InProgress => style("in progress").yellow().to_string(),
    }
}

fn pr_state_label(state: PullRequestState) -> String {
    match state {
        PullRequestState::Open => style("open").green().to_string(),
        PullRequestState::Merged => style("merged").magenta().to_string(),
        PullRequestState::Closed => style("closed").red().to_string(),
    }
}

pub(crate) fn print_repository(info: &RepositoryInfo) {
    println!("{:<11} {}", style("visibility").dim(), info.visibility);
    println!("{:<11} {}", style("http").dim(), info.http_clone_url);
    println!("{:<11} {}", style("ssh").dim(), info.ssh_clone_url);
}

pub(crate) fn print_commit(commit: &CommitInfo) {
    println!("{} {}", style("commit").yellow(), style(&commit.hash).yellow());
    println!("Author:    {} <{}>", commit.author_name, commit.author_email);
    println!("Committer: {}", commit.committer_name);
    if let Some(date) = DateTime::from_timestamp(commit.timestamp, 0) {
        println!("Date:      {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !commit.parents.is_empty() {
        println!("Parents:   {}", commit.parents.join(" "));
    }
    println!("URL:       {}", commit.url);
    println!();
    for line in commit.message.lines() {
        println!("    {}", line);
    }
}

pub(crate) fn print_statuses(statuses: &[CommitStatusInfo]) {
    if statuses.is_empty() {
        println!("{}", style("No statuses reported.").dim());
        return;
    }
    for status in statuses {
        println!(
            "{:<12} {:<24} {}",
            status_label(status.state),
            style(&status.context).bold(),
            status.description
        );
        if let Some(url) = &status.target_url {
            println!("{:<12} {}", "", style(url).dim());
        }
    }
}

pub(crate) fn print_pull_request(pr: &PullRequestInfo) {
    println!(
        "{} {} [{}]",
        style(format!("#{}", pr.id)).bold(),
        pr.title,
        pr_state_label(pr.state)
    );
    println!(
        "{}/{}:{} -> {}/{}:{}",
        pr.source_owner,
        pr.source_repo,
        pr.source_branch,
        pr.target_owner,
        pr.target_repo,
        pr.target_branch
    );
    println!("by {}  {}", pr.author, style(&pr.url).dim());
    if !pr.body.is_empty() {
        println!();
        println!("{}", pr.body);
    }
}

pub(crate) fn print_comments(comments: &[CommentInfo]) {
    if comments.is_empty() {
        println!("{}", style("No comments.").dim());
        return;
    }
    for comment in comments {
        let indent = if comment.thread_id.is_some() { "  " } else { "" };
        println!(
            "{}{} {}",
            indent,
            style(format!("[{}]", comment.id)).cyan(),
            style(comment.created_at.to_rfc3339()).dim()
        );
        for line in comment.content.lines() {
            println!("{}  {}", indent, line);
        }
    }
}
