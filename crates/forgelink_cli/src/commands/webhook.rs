//! Webhook commands.
//!
//! The secret returned on create and update is printed once; the forge never
//! hands it back.

use clap::ValueEnum;
use console::style;

use forgelink::{WebhookEvent, WebhookHandle};

use super::output::emit;
use super::{RepoRef, Session};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EventArg {
    PrOpened,
    PrEdited,
    PrMerged,
    PrRejected,
    PrCommented,
    Push,
    TagPushed,
    TagRemoved,
}

impl From<EventArg> for WebhookEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::PrOpened => WebhookEvent::PrOpened,
            EventArg::PrEdited => WebhookEvent::PrEdited,
            EventArg::PrMerged => WebhookEvent::PrMerged,
            EventArg::PrRejected => WebhookEvent::PrRejected,
            EventArg::PrCommented => WebhookEvent::PrCommented,
            EventArg::Push => WebhookEvent::Push,
            EventArg::TagPushed => WebhookEvent::TagPushed,
            EventArg::TagRemoved => WebhookEvent::TagRemoved,
        }
    }
}

/// No `--event` flags means every event.
pub(crate) fn resolve_events(args: &[EventArg]) -> Vec<WebhookEvent> {
    if args.is_empty() {
        WebhookEvent::ALL.to_vec()
    } else {
        args.iter().copied().map(WebhookEvent::from).collect()
    }
}

pub(crate) async fn handle_create(
    session: &Session,
    repo: &RepoRef,
    url: &str,
    events: &[EventArg],
) -> CmdResult {
    let handle = session
        .client
        .create_webhook(
            &session.ctx,
            &repo.owner,
            &repo.name,
            url,
            &resolve_events(events),
        )
        .await?;
    tracing::info!(repository = %repo, id = %handle.id, "Webhook created");
    emit(&handle, session.output, print_handle)
}

pub(crate) async fn handle_update(
    session: &Session,
    repo: &RepoRef,
    id: &str,
    url: &str,
    events: &[EventArg],
) -> CmdResult {
    let handle = session
        .client
        .update_webhook(
            &session.ctx,
            &repo.owner,
            &repo.name,
            id,
            url,
            &resolve_events(events),
        )
        .await?;
    tracing::info!(repository = %repo, id = %handle.id, "Webhook updated");
    emit(&handle, session.output, print_handle)
}

pub(crate) async fn handle_delete(session: &Session, repo: &RepoRef, id: &str) -> CmdResult {
    session
        .client
        .delete_webhook(&session.ctx, &repo.owner, &repo.name, id)
        .await?;
    println!("{} webhook {} deleted", style("✓").green(), id);
    Ok(())
}

fn print_handle(handle: &WebhookHandle) {
    println!("{} webhook {}", style("✓").green(), style(&handle.id).bold());
    println!("secret: {}", handle.token);
    println!(
        "{}",
        style("Store the secret now; it cannot be retrieved later.").dim()
    );
}
