//! Commit and commit status commands.

use clap::ValueEnum;
use console::style;

use forgelink::{CommitStatus, NewCommitStatus};

use super::output::{emit, print_commit, print_statuses, status_label};
use super::{RepoRef, Session};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum StateArg {
    Pass,
    Fail,
    Error,
    InProgress,
}

impl From<StateArg> for CommitStatus {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Pass => CommitStatus::Pass,
            StateArg::Fail => CommitStatus::Fail,
            StateArg::Error => CommitStatus::Error,
            StateArg::InProgress => CommitStatus::InProgress,
        }
    }
}

pub(crate) async fn handle_commit(session: &Session, repo: &RepoRef, sha: &str) -> CmdResult {
    let commit = session
        .client
        .get_commit(&session.ctx, &repo.owner, &repo.name, sha)
        .await?;
    emit(&commit, session.output, print_commit)
}

pub(crate) async fn handle_statuses(session: &Session, repo: &RepoRef, sha: &str) -> CmdResult {
    let statuses = session
        .client
        .get_commit_statuses(&session.ctx, &repo.owner, &repo.name, sha)
        .await?;
    emit(&statuses, session.output, |s| print_statuses(s))
}

pub(crate) async fn handle_set_status(
    session: &Session,
    repo: &RepoRef,
    sha: &str,
    status: NewCommitStatus,
) -> CmdResult {
    session
        .client
        .set_commit_status(&session.ctx, &repo.owner, &repo.name, sha, &status)
        .await?;

    tracing::info!(
        repository = %repo,
        sha,
        context = %status.context,
        "Commit status set"
    );
    println!(
        "{} {} set to {} on {}",
        style("✓").green(),
        style(&status.context).bold(),
        status_label(status.state),
        sha
    );
    Ok(())
}
