//! Upstream REST client.
//!
//! # Responsibilities
//! - Issue exactly one HTTP request per `send`
//! - Attach credentials and the protocol headers the API requires
//! - Resolve the response into `UpstreamResponse` or a tagged `UpstreamError`
//!
//! The client is an immutable handle built from injected configuration and is
//! shared read-only across requests. All retry state lives in the
//! per-request `OutboundRequest`.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;
use url::Url;

use crate::config::schema::{TimeoutConfig, UpstreamConfig};
use crate::upstream::classify::classify_failure;
use crate::upstream::types::{OutboundRequest, UpstreamError, UpstreamResponse};

/// Version header the upstream API requires on every call.
pub const API_VERSION_HEADER: &str = "x-github-api-version";

/// Media type for the upstream's JSON representation.
pub const GITHUB_JSON: &str = "application/vnd.github+json";

/// Anything that can perform a single upstream call.
pub trait Upstream: Send + Sync {
    /// Issue one request. Never retries.
    fn send(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// Errors raised while building the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid upstream base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// reqwest-backed client for the upstream REST API.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: Url,
    api_version: HeaderValue,
    fallback_retry_after_secs: u64,
}

impl GitHubClient {
    /// Build a client from configuration.
    pub fn new(
        config: &UpstreamConfig,
        timeouts: &TimeoutConfig,
        fallback_retry_after_secs: u64,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|source| ClientError::InvalidBaseUrl {
            url: config.base_url.clone(),
            source,
        })?;
        let api_version = HeaderValue::from_str(&config.api_version)
            .map_err(|_| ClientError::InvalidHeader("api_version"))?;

        let mut default_headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::InvalidHeader("token"))?;
            value.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers)
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs))
            .build()?;

        tracing::info!(
            base_url = %base_url,
            api_version = %config.api_version,
            authenticated = config.token.as_deref().is_some_and(|t| !t.is_empty()),
            "Upstream client initialized"
        );

        Ok(Self {
            http,
            base_url,
            api_version,
            fallback_retry_after_secs,
        })
    }

    /// Build the outbound request for an upstream path, with the fixed
    /// protocol header set.
    pub fn outbound(&self, path: impl Into<String>) -> OutboundRequest {
        OutboundRequest::get(path)
            .with_header(
                HeaderName::from_static(API_VERSION_HEADER),
                self.api_version.clone(),
            )
            .with_header(ACCEPT, HeaderValue::from_static(GITHUB_JSON))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

impl Upstream for GitHubClient {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url_for(&request.path);

        tracing::debug!(method = %request.method, url = %url, "Sending upstream request");

        let response = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            let body = if text.trim().is_empty() {
                serde_json::Value::Null
            } else {
                match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(_) => serde_json::Value::String(text),
                }
            };
            return Ok(UpstreamResponse { status, body });
        }

        Err(classify_failure(
            status,
            &headers,
            &text,
            now_epoch_secs(),
            self.fallback_retry_after_secs,
        ))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport {
        message: err.to_string(),
        timeout: err.is_timeout(),
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
