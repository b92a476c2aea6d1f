//! Forgelink CLI - drive GitHub, GitLab and Bitbucket through one command set.

mod commands;
mod config;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use forgelink::http::ReqwestTransport;
use forgelink::{CallContext, CommitStatus, LabelInfo, NewCommitStatus, NewPullRequest};

use crate::commands::commit::StateArg;
use crate::commands::output::OutputFormat;
use crate::commands::repo::VisibilityArg;
use crate::commands::webhook::EventArg;
use crate::commands::{RepoRef, Session};
use crate::config::ForgeOverrides;

#[derive(Parser)]
#[command(name = "forgelink")]
#[command(version)]
#[command(about = "One command set for GitHub, GitLab and Bitbucket")]
#[command(
    long_about = "Forgelink talks to GitHub, GitLab, Bitbucket Server and Bitbucket Cloud \
through a single normalized vocabulary. Commit states, webhook events, repository \
visibility and deploy key permissions mean the same thing on every forge; pagination \
and rate-limit retries are handled for you."
)]
#[command(after_long_help = r#"EXAMPLES
    Check credentials:
        $ forgelink --provider github test

    Report a build status:
        $ forgelink set-status acme/widgets 3f2a9c1 --state in-progress --context ci/build

    Register a webhook for pushes and merged pull requests:
        $ forgelink webhook create acme/widgets https://ci.example.com/hook \
            --event push --event pr-merged

    Extract a tag into ./src-tree:
        $ forgelink download acme/widgets v1.2.0 ./src-tree

CONFIGURATION
    Forgelink reads configuration from:
      1. ~/.config/forgelink/config.toml (or $XDG_CONFIG_HOME/forgelink/config.toml)
      2. ./forgelink.toml
      3. Environment variables (FORGELINK_* prefix, e.g., FORGELINK_FORGE_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FORGELINK_FORGE_PROVIDER   github, gitlab, bitbucket-server or bitbucket-cloud
    FORGELINK_FORGE_TOKEN      Access token or app password
    FORGELINK_FORGE_URL        API root (required for Bitbucket Server)
    FORGELINK_FORGE_USERNAME   Username for Basic auth
    FORGELINK_FORGE_SCOPE      Owner, group, project key or workspace for `repos`
    FORGELINK_RETRY_ATTEMPTS   Retries on rate limits (default: 5)
    FORGELINK_RETRY_DELAY      Seconds between retries (default: 60)
"#)]
struct Cli {
    /// Provider to talk to (overrides config)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// API root URL (overrides config)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Username for Basic auth (overrides config)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Limit repository listing to one owner (overrides config)
    #[arg(short, long, global = true)]
    scope: Option<String>,

    /// Give up after this many seconds, including rate-limit waits
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the configured credentials work
    Test,
    /// List every accessible repository, grouped by owner
    Repos,
    /// List branches of a repository
    Branches {
        /// Repository as OWNER/REPO
        repo: RepoRef,
    },
    /// Show clone URLs and visibility
    Info {
        /// Repository as OWNER/REPO
        repo: RepoRef,
    },
    /// Create a repository
    Create {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        #[arg(long, value_enum, default_value_t)]
        visibility: VisibilityArg,
    },
    /// Show a commit
    Commit {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        sha: String,
    },
    /// List statuses reported against a commit
    Statuses {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        sha: String,
    },
    /// Report a status against a commit
    SetStatus {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        sha: String,
        #[arg(long, value_enum)]
        state: StateArg,
        /// Check name (GitHub context, GitLab name, Bitbucket key)
        #[arg(long)]
        context: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Link shown next to the status
        #[arg(long)]
        target_url: Option<String>,
    },
    /// Pull request operations
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },
    /// Label operations
    Labels {
        #[command(subcommand)]
        action: LabelAction,
    },
    /// Webhook operations
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// Install an SSH deploy key
    DeployKey {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        #[arg(long)]
        title: String,
        /// Path to the public key
        #[arg(long)]
        key_file: PathBuf,
        /// Grant push access
        #[arg(long)]
        write: bool,
    },
    /// List deployment environments
    Environments {
        /// Repository as OWNER/REPO
        repo: RepoRef,
    },
    /// Upload a SARIF report
    CodeScanning {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        sha: String,
        /// Fully qualified ref, e.g. refs/heads/main
        git_ref: String,
        sarif_file: PathBuf,
    },
    /// Download a ref and extract it into a directory
    Download {
        /// Repository as OWNER/REPO
        repo: RepoRef,
        git_ref: String,
        dest: PathBuf,
    },
}

#[derive(Subcommand)]
enum PrAction {
    /// Show a pull request
    Show { repo: RepoRef, id: u64 },
    /// Open a pull request within the repository
    Create {
        repo: RepoRef,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// List comments in order
    Comments { repo: RepoRef, id: u64 },
    /// Add a comment
    Comment {
        repo: RepoRef,
        id: u64,
        body: String,
    },
}

#[derive(Subcommand)]
enum LabelAction {
    /// List labels
    List { repo: RepoRef },
    /// Look up a label by name
    Get { repo: RepoRef, name: String },
    /// Create a label
    Create {
        repo: RepoRef,
        name: String,
        /// Six hex digits, with or without a leading '#'
        #[arg(long)]
        color: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Register a webhook; prints its generated secret
    Create {
        repo: RepoRef,
        url: String,
        /// Events to subscribe to (repeatable; default: all)
        #[arg(long = "event", value_enum)]
        events: Vec<EventArg>,
    },
    /// Replace a webhook's URL and events, rotating its secret
    Update {
        repo: RepoRef,
        id: String,
        url: String,
        #[arg(long = "event", value_enum)]
        events: Vec<EventArg>,
    },
    /// Delete a webhook
    Delete { repo: RepoRef, id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Set up graceful shutdown handler (Ctrl+C)
    let cancel = shutdown::setup_shutdown_handler();

    // Initialize tracing for non-TTY mode (structured logging)
    // Only initialize if not connected to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("forgelink=info,forgelink_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    let overrides = ForgeOverrides {
        provider: cli.provider.clone(),
        url: cli.url.clone(),
        username: cli.username.clone(),
        scope: cli.scope.clone(),
    };
    let connection = config.connection(&overrides)?;
    let transport = ReqwestTransport::with_timeout(config.request_timeout())?;
    let client =
        forgelink::create_client_with_policy(&connection, Arc::new(transport), config.retry_policy())?;

    let mut ctx = CallContext::with_cancellation(cancel);
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    let session = Session {
        client,
        ctx,
        output: cli.output,
    };

    match cli.command {
        Commands::Test => commands::repo::handle_test(&session).await?,
        Commands::Repos => commands::repo::handle_repos(&session).await?,
        Commands::Branches { repo } => commands::repo::handle_branches(&session, &repo).await?,
        Commands::Info { repo } => commands::repo::handle_info(&session, &repo).await?,
        Commands::Create { repo, visibility } => {
            commands::repo::handle_create(&session, &repo, visibility).await?;
        }
        Commands::Commit { repo, sha } => {
            commands::commit::handle_commit(&session, &repo, &sha).await?;
        }
        Commands::Statuses { repo, sha } => {
            commands::commit::handle_statuses(&session, &repo, &sha).await?;
        }
        Commands::SetStatus {
            repo,
            sha,
            state,
            context,
            description,
            target_url,
        } => {
            let status = NewCommitStatus {
                state: CommitStatus::from(state),
                context,
                description,
                target_url,
            };
            commands::commit::handle_set_status(&session, &repo, &sha, status).await?;
        }
        Commands::Pr { action } => match action {
            PrAction::Show { repo, id } => commands::pull::handle_show(&session, &repo, id).await?,
            PrAction::Create {
                repo,
                source,
                target,
                title,
                body,
            } => {
                let request = NewPullRequest {
                    title,
                    body,
                    source_branch: source,
                    target_branch: target,
                };
                commands::pull::handle_create(&session, &repo, request).await?;
            }
            PrAction::Comments { repo, id } => {
                commands::pull::handle_comments(&session, &repo, id).await?;
            }
            PrAction::Comment { repo, id, body } => {
                commands::pull::handle_comment(&session, &repo, id, &body).await?;
            }
        },
        Commands::Labels { action } => match action {
            LabelAction::List { repo } => {
                commands::repo::handle_list_labels(&session, &repo).await?;
            }
            LabelAction::Get { repo, name } => {
                commands::repo::handle_get_label(&session, &repo, &name).await?;
            }
            LabelAction::Create {
                repo,
                name,
                color,
                description,
            } => {
                let label = LabelInfo {
                    name,
                    description,
                    color: color.trim_start_matches('#').to_string(),
                };
                commands::repo::handle_create_label(&session, &repo, label).await?;
            }
        },
        Commands::Webhook { action } => match action {
            WebhookAction::Create { repo, url, events } => {
                commands::webhook::handle_create(&session, &repo, &url, &events).await?;
            }
            WebhookAction::Update {
                repo,
                id,
                url,
                events,
            } => {
                commands::webhook::handle_update(&session, &repo, &id, &url, &events).await?;
            }
            WebhookAction::Delete { repo, id } => {
                commands::webhook::handle_delete(&session, &repo, &id).await?;
            }
        },
        Commands::DeployKey {
            repo,
            title,
            key_file,
            write,
        } => {
            commands::repo::handle_deploy_key(&session, &repo, &title, &key_file, write).await?;
        }
        Commands::Environments { repo } => {
            commands::repo::handle_environments(&session, &repo).await?;
        }
        Commands::CodeScanning {
            repo,
            sha,
            git_ref,
            sarif_file,
        } => {
            commands::repo::handle_code_scanning(&session, &repo, &sha, &git_ref, &sarif_file)
                .await?;
        }
        Commands::Download {
            repo,
            git_ref,
            dest,
        } => {
            commands::repo::handle_download(&session, &repo, &git_ref, &dest).await?;
        }
    }

    Ok(())
}
