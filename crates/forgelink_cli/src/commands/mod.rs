pub(crate) mod commit;
pub(crate) mod output;
pub(crate) mod pull;
pub(crate) mod repo;
pub(crate) mod webhook;

use std::str::FromStr;
use std::sync::Arc;

use forgelink::{CallContext, ScmClient};

use self::output::OutputFormat;

/// Everything a command handler needs: the adapter, the call context that
/// carries Ctrl+C cancellation and the deadline, and the output format.
pub(crate) struct Session {
    pub client: Arc<dyn ScmClient>,
    pub ctx: CallContext,
    pub output: OutputFormat,
}

/// A repository given on the command line as `owner/name`.
///
/// The owner may itself contain slashes (GitLab subgroups); the last
/// segment is the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        match trimmed.rsplit_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(format!("expected OWNER/REPO, got {s:?}")),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
