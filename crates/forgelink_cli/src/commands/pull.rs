//! Pull request commands.

use console::style;

use forgelink::NewPullRequest;

use super::output::{emit, print_comments, print_pull_request};
use super::{RepoRef, Session};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) async fn handle_show(session: &Session, repo: &RepoRef, id: u64) -> CmdResult {
    let pr = session
        .client
        .get_pull_request(&session.ctx, &repo.owner, &repo.name, id)
        .await?;
    emit(&pr, session.output, print_pull_request)
}

pub(crate) async fn handle_create(
    session: &Session,
    repo: &RepoRef,
    request: NewPullRequest,
) -> CmdResult {
    let pr = session
        .client
        .create_pull_request(&session.ctx, &repo.owner, &repo.name, &request)
        .await?;
    tracing::info!(repository = %repo, id = pr.id, "Opened pull request");
    emit(&pr, session.output, print_pull_request)
}

pub(crate) async fn handle_comments(session: &Session, repo: &RepoRef, id: u64) -> CmdResult {
    let comments = session
        .client
        .list_pull_request_comments(&session.ctx, &repo.owner, &repo.name, id)
        .await?;
    emit(&comments, session.output, |c| print_comments(c))
}

pub(crate) async fn handle_comment(
    session: &Session,
    repo: &RepoRef,
    id: u64,
    body: &str,
) -> CmdResult {
    let comment = session
        .client
        .add_pull_request_comment(&session.ctx, &repo.owner, &repo.name, id, body)
        .await?;
    emit(&comment, session.output, |comment| {
        println!(
            "{} comment {} added to #{}",
            style("✓").green(),
            comment.id,
            id
        );
    })
}
