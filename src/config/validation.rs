//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// Upper bound on `throttle.retry_limit`.
pub const MAX_RETRY_LIMIT: u32 = 10;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.base_url: '{0}' is not a valid http(s) URL")]
    InvalidBaseUrl(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("throttle.retry_limit must be at most {max}, got {0}", max = MAX_RETRY_LIMIT)]
    RetryLimitTooHigh(u32),

    #[error("throttle.transport_base_delay_ms ({base}) exceeds transport_max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(config.upstream.base_url.clone())),
    }

    if config.upstream.api_version.trim().is_empty() {
        errors.push(ValidationError::Empty("upstream.api_version"));
    }
    if config.upstream.user_agent.trim().is_empty() {
        errors.push(ValidationError::Empty("upstream.user_agent"));
    }

    if config.throttle.retry_limit > MAX_RETRY_LIMIT {
        errors.push(ValidationError::RetryLimitTooHigh(config.throttle.retry_limit));
    }
    if config.throttle.transport_base_delay_ms > config.throttle.transport_max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.throttle.transport_base_delay_ms,
            max: config.throttle.transport_max_delay_ms,
        });
    }

    for (field, value) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
