use thiserror::Error;

use crate::http::HttpError;

use super::types::ProviderKind;

/// A capability that some providers structurally lack.
///
/// Paired with a [`ProviderKind`] inside [`ScmError::Unsupported`]; callers
/// branch on the pair instead of matching error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Repository labels (absent on both Bitbucket flavours).
    Labels,
    /// SARIF code-scanning upload (GitHub only).
    CodeScanning,
    /// Deployment environments (absent on Bitbucket Server).
    Environments,
    /// Deploy keys with push access (Bitbucket Cloud keys are read-only).
    WriteDeployKeys,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Labels => write!(f, "labels"),
            Capability::CodeScanning => write!(f, "code scanning"),
            Capability::Environments => write!(f, "environments"),
            Capability::WriteDeployKeys => write!(f, "write deploy keys"),
        }
    }
}

/// Errors returned by every [`ScmClient`](super::ScmClient) operation.
#[derive(Debug, Error)]
pub enum ScmError {
    /// One or more required parameters were blank. Never reaches the network.
    #[error("missing required parameters: {}", .names.join(", "))]
    MissingParameters { names: Vec<&'static str> },

    /// A parameter was present but malformed (e.g. a non-numeric webhook id).
    #[error("invalid {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The active provider has no equivalent for the requested capability.
    #[error("{capability} not supported by {provider}")]
    Unsupported {
        provider: ProviderKind,
        capability: Capability,
    },

    /// The remote lookup target does not exist.
    #[error("{operation} {resource}: not found")]
    NotFound {
        operation: &'static str,
        resource: String,
    },

    /// The provider throttled the request. Only surfaced once retries are exhausted,
    /// or immediately for secondary (abuse) limits.
    #[error("{operation} {resource}: rate limit exceeded: {message}")]
    RateLimited {
        operation: &'static str,
        resource: String,
        message: String,
        secondary: bool,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller-supplied deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Any other non-2xx response.
    #[error("{operation} {resource}: HTTP {status}: {message}")]
    Remote {
        operation: &'static str,
        resource: String,
        status: u16,
        message: String,
    },

    /// The transport failed before a response was received.
    #[error("{operation} {resource}: {source}")]
    Transport {
        operation: &'static str,
        resource: String,
        #[source]
        source: HttpError,
    },

    /// The response did not have the expected shape.
    #[error("{operation} {resource}: unexpected response: {message}")]
    Decode {
        operation: &'static str,
        resource: String,
        message: String,
    },

    /// Extracting or writing a downloaded archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] std::io::Error),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScmError {
    /// Create an invalid-argument error.
    #[inline]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Create an unsupported-capability error.
    #[inline]
    pub fn unsupported(provider: ProviderKind, capability: Capability) -> Self {
        Self::Unsupported {
            provider,
            capability,
        }
    }

    /// Create a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for [`ScmError::Unsupported`].
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// True for [`ScmError::NotFound`].
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for [`ScmError::RateLimited`], primary or secondary.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// True when the caller cancelled or the deadline passed.
    #[inline]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True for errors produced locally before any remote call.
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MissingParameters { .. } | Self::InvalidArgument { .. } | Self::Unsupported { .. }
        )
    }
}

/// Operation name plus the resource it targets, attached to every remote error.
#[derive(Debug, Clone)]
pub struct Op {
    pub name: &'static str,
    pub resource: String,
}

impl Op {
    pub fn new(name: &'static str, resource: impl Into<String>) -> Self {
        Self {
            name,
            resource: resource.into(),
        }
    }

    /// Shorthand for the common `owner/repo` resource.
    pub fn repo(name: &'static str, owner: &str, repo: &str) -> Self {
        Self::new(name, format!("{owner}/{repo}"))
    }

    pub fn not_found(&self) -> ScmError {
        ScmError::NotFound {
            operation: self.name,
            resource: self.resource.clone(),
        }
    }

    pub fn remote(&self, status: u16, message: impl Into<String>) -> ScmError {
        ScmError::Remote {
            operation: self.name,
            resource: self.resource.clone(),
            status,
            message: message.into(),
        }
    }

    pub fn rate_limited(&self, message: impl Into<String>, secondary: bool) -> ScmError {
        ScmError::RateLimited {
            operation: self.name,
            resource: self.resource.clone(),
            message: message.into(),
            secondary,
        }
    }

    pub fn transport(&self, source: HttpError) -> ScmError {
        ScmError::Transport {
            operation: self.name,
            resource: self.resource.clone(),
            source,
        }
    }

    pub fn decode(&self, message: impl Into<String>) -> ScmError {
        ScmError::Decode {
            operation: self.name,
            resource: self.resource.clone(),
            message: message.into(),
        }
    }
}

/// Default response classification shared by providers without special
/// rate-limit heuristics: 404 is not-found, 429 is a rate limit, anything
/// else is a generic remote error.
pub fn classify_status(op: &Op, status: u16, body: &str) -> ScmError {
    match status {
        404 => op.not_found(),
        429 => op.rate_limited(short_body(body), false),
        _ => op.remote(status, short_body(body)),
    }
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn short_body(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX {
        let truncated: String = trimmed.chars().take(MAX - 3).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line response bodies.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, ScmError>;
