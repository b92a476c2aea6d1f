//! Configuration file support for forgelink.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `FORGELINK_`, e.g., `FORGELINK_FORGE_TOKEN`)
//! 3. Config file (./forgelink.toml, then ~/.config/forgelink/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [forge]
//! provider = "gitlab"                 # github, gitlab, bitbucket-server, bitbucket-cloud
//! url = "https://gitlab.example.com/api/v4"  # optional for hosted providers
//! token = "glpat-..."                 # or use FORGELINK_FORGE_TOKEN env var
//! username = "ada"                    # Bitbucket app passwords / Basic auth only
//! scope = "acme"                      # restrict repository listing to one owner
//!
//! [retry]
//! attempts = 5   # retries after the first attempt on rate limits
//! delay = 60     # seconds between attempts
//!
//! [request]
//! timeout = 60   # seconds per HTTP request
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use forgelink::{ConnectionConfig, ProviderKind, RetryPolicy};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which forge to talk to and how to authenticate.
    pub forge: ForgeConfig,
    /// Rate-limit retry behaviour.
    pub retry: RetryConfig,
    /// HTTP request options.
    pub request: RequestConfig,
}

/// Connection settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Provider name (e.g. "github" or "bitbucket-server").
    pub provider: Option<String>,
    /// API root. Required for Bitbucket Server.
    pub url: Option<String>,
    /// Access token. Can also be set via FORGELINK_FORGE_TOKEN.
    pub token: Option<String>,
    /// Username for Basic auth.
    pub username: Option<String>,
    /// Owner, group, project key or workspace to list repositories from.
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: usize,
    /// Seconds.
    pub delay: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: forgelink::retry::DEFAULT_MAX_RETRIES,
            delay: forgelink::retry::DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Seconds.
    pub timeout: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout: 60 }
    }
}

/// Connection values given on the command line. Set values win over the
/// config file and environment.
#[derive(Debug, Default, Clone)]
pub struct ForgeOverrides {
    pub provider: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub scope: Option<String>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/forgelink/config.toml)
    /// 3. Local config file (./forgelink.toml)
    /// 4. Environment variables with FORGELINK_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("forgelink.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./forgelink.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., FORGELINK_FORGE_TOKEN -> forge.token
        builder = builder.add_source(
            Environment::with_prefix("FORGELINK")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "forgelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Merge CLI overrides into the connection settings.
    pub fn connection(&self, overrides: &ForgeOverrides) -> Result<ConnectionConfig, String> {
        let provider = overrides
            .provider
            .as_deref()
            .or(self.forge.provider.as_deref())
            .ok_or("no provider configured: pass --provider or set FORGELINK_FORGE_PROVIDER")?
            .parse::<ProviderKind>()?;

        let token = self
            .forge
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or("no token configured: set FORGELINK_FORGE_TOKEN or forge.token")?;

        let mut connection = ConnectionConfig::new(provider, token);
        if let Some(url) = overrides.url.clone().or_else(|| self.forge.url.clone()) {
            connection = connection.with_api_url(url);
        }
        if let Some(username) = overrides
            .username
            .clone()
            .or_else(|| self.forge.username.clone())
        {
            connection = connection.with_username(username);
        }
        if let Some(scope) = overrides.scope.clone().or_else(|| self.forge.scope.clone()) {
            connection = connection.with_scope(scope);
        }
        Ok(connection)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.attempts, Duration::from_secs(self.retry.delay))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.forge.provider.is_none());
        assert!(config.forge.token.is_none());
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay, 60);
        assert_eq!(config.request.timeout, 60);
    }

    #[test]
    fn test_connection_from_file() {
        let config = from_toml(
            r#"
            [forge]
            provider = "bitbucket-server"
            url = "https://git.example.com/"
            token = "secret"
            username = "ada"
            scope = "PRJ"

            [retry]
            attempts = 2
        "#,
        );

        let connection = config.connection(&ForgeOverrides::default()).unwrap();
        assert_eq!(connection.provider, ProviderKind::BitbucketServer);
        assert_eq!(connection.resolved_api_url().unwrap(), "https://git.example.com");
        assert_eq!(connection.username.as_deref(), Some("ada"));
        assert_eq!(connection.scope.as_deref(), Some("PRJ"));
        assert_eq!(config.retry_policy().max_retries(), 2);
        assert_eq!(config.retry.delay, 60);
    }

    #[test]
    fn test_overrides_win() {
        let config = from_toml(
            r#"
            [forge]
            provider = "github"
            token = "ghp_test"
            scope = "acme"
        "#,
        );
        let overrides = ForgeOverrides {
            provider: Some("gitlab".to_string()),
            scope: Some("other".to_string()),
            ..Default::default()
        };

        let connection = config.connection(&overrides).unwrap();
        assert_eq!(connection.provider, ProviderKind::GitLab);
        assert_eq!(connection.scope.as_deref(), Some("other"));
    }

    #[test]
    fn test_missing_token_is_reported() {
        let config = from_toml(
            r#"
            [forge]
            provider = "github"
        "#,
        );
        let err = config.connection(&ForgeOverrides::default()).unwrap_err();
        assert!(err.contains("token"));
    }

    #[test]
    fn test_unknown_provider_is_reported() {
        let config = from_toml(
            r#"
            [forge]
            provider = "sourcehut"
            token = "x"
        "#,
        );
        let err = config.connection(&ForgeOverrides::default()).unwrap_err();
        assert!(err.contains("sourcehut"));
    }
}
