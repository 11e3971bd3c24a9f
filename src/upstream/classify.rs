//! Classification of non-success upstream responses.
//!
//! # Rules
//! ```text
//! 403/429 + body mentions "secondary rate limit" or "abuse"
//!     → RateLimitSecondary(retry-after header, if any)
//! 403/429 + x-ratelimit-remaining: 0
//!     → RateLimitPrimary(retry-after header, else x-ratelimit-reset - now)
//! 429 otherwise
//!     → RateLimitPrimary(retry-after header, else configured fallback)
//! anything else
//!     → Status(status, message)
//! ```
//!
//! Pure functions: the current time is passed in so tests stay deterministic.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::upstream::types::UpstreamError;

pub const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Classify a non-2xx response.
///
/// `now_epoch_secs` is the current UNIX time, `fallback_retry_after_secs` is
/// used for a bare 429 with no timing headers.
pub fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    now_epoch_secs: u64,
    fallback_retry_after_secs: u64,
) -> UpstreamError {
    let message = error_message(body);
    let limited_status =
        status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS;

    if limited_status && is_secondary_message(&message) {
        return UpstreamError::RateLimitSecondary {
            retry_after_secs: retry_after(headers),
        };
    }

    if limited_status && header_u64(headers, RATELIMIT_REMAINING) == Some(0) {
        let retry_after_secs = retry_after(headers)
            .or_else(|| {
                header_u64(headers, RATELIMIT_RESET)
                    .map(|reset| reset.saturating_sub(now_epoch_secs))
            })
            .unwrap_or(fallback_retry_after_secs);
        return UpstreamError::RateLimitPrimary { retry_after_secs };
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return UpstreamError::RateLimitPrimary {
            retry_after_secs: retry_after(headers).unwrap_or(fallback_retry_after_secs),
        };
    }

    UpstreamError::Status { status, message }
}

/// Pull the `message` field out of an upstream JSON error body.
///
/// Falls back to the raw (trimmed) body when it is not JSON.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn is_secondary_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("secondary rate") || lower.contains("abuse")
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, RETRY_AFTER.as_str())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
