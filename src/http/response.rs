//! Response relay.
//!
//! # Responsibilities
//! - Turn an `UpstreamOutcome` into the caller-facing response
//! - Map failure kinds to HTTP status codes
//!
//! # Wire format
//! ```text
//! success: <upstream status>  {"message": <upstream JSON>}
//! failure: <mapped status>    {"error": {"kind", "message", "status"?, "retry_after_secs"?, "attempts"?}}
//! ```
//!
//! | kind            | status                          |
//! |-----------------|---------------------------------|
//! | rate_limited    | 429 (+ Retry-After when known)  |
//! | upstream        | upstream status                 |
//! | transport       | 502, or 504 on timeout          |
//! | cancelled       | 503                             |
//! | invalid_request | 400                             |

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::routing::TranslateError;
use crate::upstream::types::{Failure, FailureKind, UpstreamOutcome};

#[derive(Debug, Serialize)]
struct SuccessBody {
    message: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
}

/// Build the caller-facing response for a terminal outcome.
pub fn relay(outcome: UpstreamOutcome) -> Response {
    match outcome {
        UpstreamOutcome::Success(response) => (
            response.status,
            Json(SuccessBody { message: response.body }),
        )
            .into_response(),
        UpstreamOutcome::Failure(failure) => failure_response(&failure),
    }
}

/// Status code a failure is reported with.
pub fn status_for(failure: &Failure) -> StatusCode {
    match failure.kind {
        FailureKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        FailureKind::Upstream => failure.status.unwrap_or(StatusCode::BAD_GATEWAY),
        FailureKind::Transport if failure.timed_out => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Transport => StatusCode::BAD_GATEWAY,
        FailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn failure_response(failure: &Failure) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: failure.kind.as_str(),
            message: &failure.message,
            status: failure.status.map(|s| s.as_u16()),
            retry_after_secs: failure.retry_after_secs,
            attempts: (failure.attempts > 0).then_some(failure.attempts),
        },
    };
    let mut response = (status_for(failure), Json(body)).into_response();

    if failure.kind == FailureKind::RateLimited {
        if let Some(secs) = failure.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
    }
    response
}

/// 400 for parameters the translator rejected.
pub fn bad_request(err: &TranslateError) -> Response {
    let message = err.to_string();
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: "invalid_request",
            message: &message,
            status: None,
            retry_after_secs: None,
            attempts: None,
        },
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
