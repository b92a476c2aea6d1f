//! Tagged-variant construction of provider adapters.

use std::sync::Arc;
use std::time::Duration;

use crate::http::{HttpTransport, ReqwestTransport};
use crate::retry::RetryPolicy;

use super::errors::{Result, ScmError};
use super::types::{ConnectionConfig, ProviderKind, ScmClient};

/// Request timeout for the default reqwest transport.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the adapter selected by `config.provider` over a fresh reqwest transport.
pub fn create_client(config: &ConnectionConfig) -> Result<Arc<dyn ScmClient>> {
    let transport = ReqwestTransport::with_timeout(DEFAULT_HTTP_TIMEOUT)
        .map_err(|e| ScmError::config(e.to_string()))?;
    create_client_with_transport(config, Arc::new(transport))
}

/// Build the adapter selected by `config.provider` over the given transport,
/// retrying with the default [`RetryPolicy`].
///
/// Fails with [`ScmError::Config`] when the token is blank, when the
/// provider needs an explicit API url that is missing, or when the
/// provider's cargo feature is disabled.
pub fn create_client_with_transport(
    config: &ConnectionConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn ScmClient>> {
    create_client_with_policy(config, transport, RetryPolicy::default())
}

/// Like [`create_client_with_transport`] with an explicit retry policy.
pub fn create_client_with_policy(
    config: &ConnectionConfig,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
) -> Result<Arc<dyn ScmClient>> {
    if config.token.trim().is_empty() {
        return Err(ScmError::config(format!(
            "{} connection requires a token",
            config.provider
        )));
    }

    tracing::debug!("Creating {} client ({:?})", config.provider, retry);

    match config.provider {
        #[cfg(feature = "github")]
        ProviderKind::GitHub => Ok(Arc::new(
            crate::github::GitHubClient::new(config, transport)?.with_retry_policy(retry),
        )),
        #[cfg(feature = "gitlab")]
        ProviderKind::GitLab => Ok(Arc::new(
            crate::gitlab::GitLabClient::new(config, transport)?.with_retry_policy(retry),
        )),
        #[cfg(feature = "bitbucket-server")]
        ProviderKind::BitbucketServer => Ok(Arc::new(
            crate::bitbucket_server::BitbucketServerClient::new(config, transport)?
                .with_retry_policy(retry),
        )),
        #[cfg(feature = "bitbucket-cloud")]
        ProviderKind::BitbucketCloud => Ok(Arc::new(
            crate::bitbucket_cloud::BitbucketCloudClient::new(config, transport)?
                .with_retry_policy(retry),
        )),
        #[cfg(not(all(
            feature = "github",
            feature = "gitlab",
            feature = "bitbucket-server",
            feature = "bitbucket-cloud"
        )))]
        other => {
            drop((transport, retry));
            Err(ScmError::config(format!(
                "{other} support was not compiled into this build"
            )))
        }
    }
}

#[cfg(all(test, feature = "github", feature = "bitbucket-server"))]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    #[test]
    fn test_factory_selects_adapter_by_provider() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());

        let config = ConnectionConfig::new(ProviderKind::GitHub, "ghp_test");
        let client = create_client_with_transport(&config, transport.clone()).unwrap();
        assert_eq!(client.provider(), ProviderKind::GitHub);

        let config = ConnectionConfig::new(ProviderKind::BitbucketServer, "token")
            .with_api_url("https://git.example.com");
        let client = create_client_with_transport(&config, transport).unwrap();
        assert_eq!(client.provider(), ProviderKind::BitbucketServer);
    }

    #[test]
    fn test_factory_rejects_blank_token() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());
        let config = ConnectionConfig::new(ProviderKind::GitHub, "  ");
        let err = create_client_with_transport(&config, transport).err().unwrap();
        assert!(matches!(err, ScmError::Config(_)));
    }

    #[test]
    fn test_factory_requires_bitbucket_server_url() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());
        let config = ConnectionConfig::new(ProviderKind::BitbucketServer, "token");
        let err = create_client_with_transport(&config, transport).err().unwrap();
        assert!(err.to_string().contains("Bitbucket Server"));
    }

    #[cfg(not(feature = "bitbucket-cloud"))]
    #[test]
    fn test_factory_reports_disabled_provider() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());
        let config = ConnectionConfig::new(ProviderKind::BitbucketCloud, "token");
        let err = create_client_with_transport(&config, transport).err().unwrap();
        assert!(matches!(err, ScmError::Config(_)));
        assert!(err.to_string().contains("not compiled"));
    }
}
