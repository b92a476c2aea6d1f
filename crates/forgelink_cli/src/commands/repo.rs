//! Repository-level commands.

use std::path::Path;

use clap::ValueEnum;
use console::style;

use forgelink::{EnvironmentInfo, LabelInfo, Permission, TarGzExtractor, Visibility};

use super::output::{emit, print_repository};
use super::{RepoRef, Session};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum VisibilityArg {
    #[default]
    Private,
    Internal,
    Public,
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Private => Visibility::Private,
            VisibilityArg::Internal => Visibility::Internal,
            VisibilityArg::Public => Visibility::Public,
        }
    }
}

pub(crate) async fn handle_test(session: &Session) -> CmdResult {
    session.client.test_connection(&session.ctx).await?;
    println!(
        "{} connected to {}",
        style("✓").green(),
        session.client.provider()
    );
    Ok(())
}

pub(crate) async fn handle_repos(session: &Session) -> CmdResult {
    let listing = session.client.list_repositories(&session.ctx).await?;
    tracing::info!(owners = listing.len(), "Listed repositories");

    emit(&listing, session.output, |listing| {
        for (owner, repos) in listing {
            println!("{}", style(owner).bold());
            for repo in repos {
                println!("  {}", repo);
            }
        }
    })
}

pub(crate) async fn handle_branches(session: &Session, repo: &RepoRef) -> CmdResult {
    let branches = session
        .client
        .list_branches(&session.ctx, &repo.owner, &repo.name)
        .await?;

    emit(&branches, session.output, |branches| {
        for branch in branches {
            println!("{}", branch);
        }
    })
}

pub(crate) async fn handle_info(session: &Session, repo: &RepoRef) -> CmdResult {
    let info = session
        .client
        .get_repository_info(&session.ctx, &repo.owner, &repo.name)
        .await?;
    emit(&info, session.output, print_repository)
}

pub(crate) async fn handle_create(
    session: &Session,
    repo: &RepoRef,
    visibility: VisibilityArg,
) -> CmdResult {
    let info = session
        .client
        .create_repository(&session.ctx, &repo.owner, &repo.name, visibility.into())
        .await?;
    tracing::info!(repository = %repo, "Created repository");
    emit(&info, session.output, print_repository)
}

pub(crate) async fn handle_list_labels(session: &Session, repo: &RepoRef) -> CmdResult {
    let labels = session
        .client
        .list_labels(&session.ctx, &repo.owner, &repo.name)
        .await?;
    emit(&labels, session.output, |labels| {
        for label in labels {
            print_label(label);
        }
    })
}

pub(crate) async fn handle_get_label(session: &Session, repo: &RepoRef, name: &str) -> CmdResult {
    let label = session
        .client
        .get_label(&session.ctx, &repo.owner, &repo.name, name)
        .await?;
    emit(&label, session.output, |label| match label {
        Some(label) => print_label(label),
        None => println!("{}", style(format!("No label named {name:?}.")).dim()),
    })
}

pub(crate) async fn handle_create_label(
    session: &Session,
    repo: &RepoRef,
    label: LabelInfo,
) -> CmdResult {
    let created = session
        .client
        .create_label(&session.ctx, &repo.owner, &repo.name, &label)
        .await?;
    emit(&created, session.output, print_label)
}

fn print_label(label: &LabelInfo) {
    println!(
        "{} {}  {}",
        style(format!("#{}", label.color)).dim(),
        style(&label.name).bold(),
        label.description
    );
}

pub(crate) async fn handle_deploy_key(
    session: &Session,
    repo: &RepoRef,
    title: &str,
    key_file: &Path,
    write: bool,
) -> CmdResult {
    let key = std::fs::read_to_string(key_file)
        .map_err(|e| format!("Failed to read {}: {}", key_file.display(), e))?;
    let permission = if write {
        Permission::ReadWrite
    } else {
        Permission::Read
    };

    let id = session
        .client
        .add_deploy_key(
            &session.ctx,
            &repo.owner,
            &repo.name,
            title,
            key.trim(),
            permission,
        )
        .await?;

    emit(&serde_json::json!({ "id": id }), session.output, |_| {
        println!("{} deploy key {} added", style("✓").green(), id);
    })
}

pub(crate) async fn handle_environments(session: &Session, repo: &RepoRef) -> CmdResult {
    let environments = session
        .client
        .list_environments(&session.ctx, &repo.owner, &repo.name)
        .await?;
    emit(&environments, session.output, |envs| print_environments(envs))
}

fn print_environments(environments: &[EnvironmentInfo]) {
    for env in environments {
        match &env.url {
            Some(url) => println!("{}  {}", style(&env.name).bold(), style(url).dim()),
            None => println!("{}", style(&env.name).bold()),
        }
    }
}

pub(crate) async fn handle_code_scanning(
    session: &Session,
    repo: &RepoRef,
    sha: &str,
    git_ref: &str,
    sarif_file: &Path,
) -> CmdResult {
    let sarif = std::fs::read(sarif_file)
        .map_err(|e| format!("Failed to read {}: {}", sarif_file.display(), e))?;
    let id = session
        .client
        .upload_code_scanning(&session.ctx, &repo.owner, &repo.name, sha, git_ref, &sarif)
        .await?;

    emit(&serde_json::json!({ "id": id }), session.output, |_| {
        println!("{} SARIF upload {} accepted", style("✓").green(), id);
    })
}

pub(crate) async fn handle_download(
    session: &Session,
    repo: &RepoRef,
    git_ref: &str,
    dest: &Path,
) -> CmdResult {
    std::fs::create_dir_all(dest)
        .map_err(|e| format!("Failed to create {}: {}", dest.display(), e))?;

    session
        .client
        .download_repository(
            &session.ctx,
            &repo.owner,
            &repo.name,
            git_ref,
            dest,
            &TarGzExtractor,
        )
        .await?;

    tracing::info!(repository = %repo, git_ref, dest = %dest.display(), "Extracted archive");
    println!(
        "{} {}@{} extracted to {}",
        style("✓").green(),
        repo,
        git_ref,
        dest.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_arg_conversion() {
        assert_eq!(Visibility::from(VisibilityArg::Internal), Visibility::Internal);
        assert_eq!(Visibility::from(VisibilityArg::default()), Visibility::Private);
    }
}
