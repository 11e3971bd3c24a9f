//! Throttle policy.
//!
//! Pure decision function: given a rate-limit signal and the request's retry
//! count, decide whether to retry and after what delay.
//!
//! # Rules
//! - Primary: retry after the upstream hint while `retry_count <= retry_limit`
//! - Secondary: never retry; the hint is discarded

use std::time::Duration;

use serde::Serialize;

use crate::upstream::types::UpstreamError;

/// Default highest retry count that still earns a retry.
pub const DEFAULT_RETRY_LIMIT: u32 = 2;

/// Rate-limit signal reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitSignal {
    /// Quota exhausted.
    Primary { retry_after_secs: u64 },
    /// Request pattern flagged by abuse detection.
    Secondary { retry_after_secs: Option<u64> },
}

impl RateLimitSignal {
    /// Extract the signal from an upstream error, if it is a rate limit.
    pub fn from_error(err: &UpstreamError) -> Option<Self> {
        match err {
            UpstreamError::RateLimitPrimary { retry_after_secs } => Some(Self::Primary {
                retry_after_secs: *retry_after_secs,
            }),
            UpstreamError::RateLimitSecondary { retry_after_secs } => Some(Self::Secondary {
                retry_after_secs: *retry_after_secs,
            }),
            _ => None,
        }
    }

    pub fn kind(&self) -> LimitKind {
        match self {
            Self::Primary { .. } => LimitKind::Primary,
            Self::Secondary { .. } => LimitKind::Secondary,
        }
    }

    /// Retry-after hint carried by the signal.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Primary { retry_after_secs } => Some(*retry_after_secs),
            Self::Secondary { retry_after_secs } => *retry_after_secs,
        }
    }
}

/// Which kind of limit was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Primary,
    Secondary,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Primary => "primary",
            LimitKind::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Retry(Duration),
    GiveUp,
}

/// Rate-limit retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    retry_limit: u32,
}

impl ThrottlePolicy {
    pub fn new(retry_limit: u32) -> Self {
        Self { retry_limit }
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Most upstream attempts a request can make under primary limits.
    pub fn max_attempts(&self) -> u32 {
        self.retry_limit + 1
    }

    pub fn decide(&self, signal: RateLimitSignal, retry_count: u32) -> ThrottleDecision {
        match signal {
            RateLimitSignal::Primary { retry_after_secs } if retry_count <= self.retry_limit => {
                ThrottleDecision::Retry(Duration::from_secs(retry_after_secs))
            }
            RateLimitSignal::Primary { .. } => ThrottleDecision::GiveUp,
            RateLimitSignal::Secondary { .. } => ThrottleDecision::GiveUp,
        }
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT)
    }
}
