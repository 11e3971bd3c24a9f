//! Request, response and error types shared by the upstream client and the
//! retry coordinator.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// A request bound for the upstream API.
///
/// Owned by exactly one in-flight coordinator invocation. Header names are
/// case-insensitive and a later `with_header` for the same name replaces the
/// earlier value.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Rate-limited attempts seen so far. Starts at 0, never reset.
    pub retry_count: u32,
    /// Transport retries taken so far. Kept apart from `retry_count`.
    pub transport_retries: u32,
    /// Latest instant at which a retry delay may still end.
    pub deadline: Option<Instant>,
}

impl OutboundRequest {
    /// Create a GET request for an upstream path such as `/advisories`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            retry_count: 0,
            transport_retries: 0,
            deadline: None,
        }
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Decoded JSON body; non-JSON bodies are carried as a JSON string.
    pub body: serde_json::Value,
}

/// Errors reported by the upstream client, resolved once at the client
/// boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    /// Primary quota exhausted.
    #[error("primary rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitPrimary { retry_after_secs: u64 },

    /// Secondary (abuse detection) limit hit.
    #[error("secondary rate limit exceeded")]
    RateLimitSecondary { retry_after_secs: Option<u64> },

    /// Non-success status that is not a rate limit (404, 401, 422, ...).
    #[error("upstream returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The upstream could not be reached at all.
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },
}

/// Failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Upstream,
    Transport,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Upstream => "upstream",
            FailureKind::Transport => "transport",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// Terminal failure detail handed to the response relay.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Upstream HTTP status, when the upstream answered.
    pub status: Option<StatusCode>,
    /// Last retry-after hint seen, in seconds.
    pub retry_after_secs: Option<u64>,
    /// Set for transport failures caused by a timeout.
    pub timed_out: bool,
    /// Upstream calls made for the request, 0 if none were.
    pub attempts: u32,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after_secs: None,
            timed_out: false,
            attempts: 0,
        }
    }
}

impl From<UpstreamError> for Failure {
    fn from(err: UpstreamError) -> Self {
        let message = err.to_string();
        match err {
            UpstreamError::RateLimitPrimary { retry_after_secs } => Failure {
                retry_after_secs: Some(retry_after_secs),
                ..Failure::new(FailureKind::RateLimited, message)
            },
            UpstreamError::RateLimitSecondary { retry_after_secs } => Failure {
                retry_after_secs,
                ..Failure::new(FailureKind::RateLimited, message)
            },
            UpstreamError::Status { status, .. } => Failure {
                status: Some(status),
                ..Failure::new(FailureKind::Upstream, message)
            },
            UpstreamError::Transport { timeout, .. } => Failure {
                timed_out: timeout,
                ..Failure::new(FailureKind::Transport, message)
            },
        }
    }
}

/// Terminal result of one coordinated upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Success(UpstreamResponse),
    Failure(Failure),
}

impl UpstreamOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UpstreamOutcome::Success(_))
    }

    /// Failure kind, or `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            UpstreamOutcome::Success(_) => None,
            UpstreamOutcome::Failure(f) => Some(f.kind),
        }
    }
}
