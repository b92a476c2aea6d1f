//! Authenticated JSON-over-HTTP plumbing shared by the provider adapters.
//!
//! A [`RestClient`] owns the transport, API root, auth headers, retry policy
//! and the provider's status classifier. Every request it sends goes through
//! [`RetryPolicy::execute`] and races the caller's [`CallContext`].

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::CallContext;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{Op, Result, ScmError, short_body};
use crate::retry::RetryPolicy;

/// Maps a non-2xx response to an error.
pub type Classifier = fn(&Op, u16, &str) -> ScmError;

#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    headers: HttpHeaders,
    retry: RetryPolicy,
    classify: Classifier,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        headers: HttpHeaders,
        classify: Classifier,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers,
            retry: RetryPolicy::default(),
            classify,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolve `path` against the API root. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Send one request with retries. Non-2xx responses are classified.
    pub async fn send(
        &self,
        ctx: &CallContext,
        op: &Op,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let mut headers = self.headers.clone();
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let request = HttpRequest {
            method,
            url: self.url(path),
            headers,
            body: body.unwrap_or_default(),
        };

        self.retry
            .execute(ctx, op, || {
                let request = request.clone();
                async move {
                    tracing::debug!("{} {}", request.method.as_str(), request.url);
                    let response = self
                        .transport
                        .send(request)
                        .await
                        .map_err(|e| op.transport(e))?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err((self.classify)(op, response.status, &response.text()))
                    }
                }
            })
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<T> {
        let response = self.send(ctx, op, HttpMethod::Get, path, None).await?;
        decode(op, &response)
    }

    /// GET returning the decoded body alongside the response headers, for
    /// header-driven pagination.
    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
    ) -> Result<(T, HttpHeaders)> {
        let response = self.send(ctx, op, HttpMethod::Get, path, None).await?;
        let value = decode(op, &response)?;
        Ok((value, response.headers))
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send_body(ctx, op, HttpMethod::Post, path, body).await?;
        decode(op, &response)
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send_body(ctx, op, HttpMethod::Put, path, body).await?;
        decode(op, &response)
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        op: &Op,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send_body(ctx, op, HttpMethod::Patch, path, body)
            .await?;
        decode(op, &response)
    }

    /// Send a JSON body and ignore the response body (e.g. `204 No Content`).
    pub async fn send_body<B: Serialize + ?Sized>(
        &self,
        ctx: &CallContext,
        op: &Op,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_vec(body).map_err(|e| op.decode(e.to_string()))?;
        self.send(ctx, op, method, path, Some(body)).await
    }

    pub async fn delete(&self, ctx: &CallContext, op: &Op, path: &str) -> Result<()> {
        self.send(ctx, op, HttpMethod::Delete, path, None).await?;
        Ok(())
    }

    /// Download raw bytes, e.g. a repository archive.
    pub async fn get_bytes(&self, ctx: &CallContext, op: &Op, path: &str) -> Result<Vec<u8>> {
        let response = self.send(ctx, op, HttpMethod::Get, path, None).await?;
        Ok(response.body)
    }
}

/// Decode a JSON response body.
pub fn decode<T: DeserializeOwned>(op: &Op, response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        op.decode(format!(
            "{e} (body: {})",
            short_body(&String::from_utf8_lossy(&response.body))
        ))
    })
}

/// `Authorization` header: Basic when a username is configured, Bearer otherwise.
pub fn authorization_header(username: Option<&str>, token: &str) -> (String, String) {
    let value = match username.filter(|u| !u.trim().is_empty()) {
        Some(user) => format!("Basic {}", BASE64.encode(format!("{user}:{token}"))),
        None => format!("Bearer {token}"),
    };
    ("Authorization".to_string(), value)
}

/// Percent-encode a value for use as a single path segment or query value.
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
