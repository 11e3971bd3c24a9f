//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::policy::DEFAULT_RETRY_LIMIT;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API settings (base URL, credentials, protocol version).
    pub upstream: UpstreamConfig,

    /// Rate-limit retry behaviour.
    pub throttle: ThrottleConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the REST API.
    pub base_url: String,

    /// Value sent in the `X-GitHub-Api-Version` header.
    pub api_version: String,

    /// Personal access token. Prefer the `GITHUB_TOKEN` environment variable.
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// User-Agent sent upstream (the API rejects requests without one).
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            api_version: "2022-11-28".to_string(),
            token: None,
            user_agent: concat!("advisory-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Rate-limit retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Highest retry count that still earns a retry on a primary limit.
    /// The default of 2 allows 3 attempts in total.
    pub retry_limit: u32,

    /// Retry-after used for a bare 429 with no timing headers.
    pub default_retry_after_secs: u64,

    /// Give up instead of sleeping past this many seconds after the first
    /// attempt. Never later than `TimeoutConfig::retry_window`.
    pub max_wait_secs: Option<u64>,

    /// Retries for transport failures (0 = never).
    pub transport_retries: u32,

    /// Base delay for transport backoff in milliseconds.
    pub transport_base_delay_ms: u64,

    /// Maximum delay for transport backoff in milliseconds.
    pub transport_max_delay_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            default_retry_after_secs: 60,
            max_wait_secs: None,
            transport_retries: 0,
            transport_base_delay_ms: 100,
            transport_max_delay_ms: 2000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Timeout for a single upstream attempt in seconds.
    pub upstream_secs: u64,

    /// Total time for an inbound request, retries included, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 300,
        }
    }
}

impl TimeoutConfig {
    /// How long retry delays may run before the inbound request timeout
    /// fires, keeping room for one more upstream attempt.
    pub fn retry_window(&self) -> Duration {
        Duration::from_secs(self.request_secs.saturating_sub(self.upstream_secs))
    }
}

impl ThrottleConfig {
    /// Bound on retry delays for one request: `max_wait_secs` if set,
    /// clamped to the request timeout's retry window.
    pub fn max_wait(&self, timeouts: &TimeoutConfig) -> Duration {
        let window = timeouts.retry_window();
        self.max_wait_secs
            .map(|secs| Duration::from_secs(secs).min(window))
            .unwrap_or(window)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:4000"

            [throttle]
            max_wait_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.throttle.retry_limit, 2);
        assert_eq!(config.throttle.max_wait_secs, Some(120));
        assert_eq!(config.upstream.base_url, "https://api.github.com");
        assert_eq!(config.upstream.api_version, "2022-11-28");
        assert_eq!(config.timeouts.request_secs, 300);
    }

    #[test]
    fn test_token_never_serialized_or_logged() {
        let mut config = GatewayConfig::default();
        config.upstream.token = Some("ghp_secret".into());

        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("ghp_secret"));
        assert!(!format!("{:?}", config).contains("ghp_secret"));
    }

    #[test]
    fn test_retry_wait_bounded_by_request_timeout() {
        let timeouts = TimeoutConfig::default();
        let mut throttle = ThrottleConfig::default();
        assert_eq!(timeouts.retry_window(), Duration::from_secs(270));
        assert_eq!(throttle.max_wait(&timeouts), Duration::from_secs(270));

        throttle.max_wait_secs = Some(60);
        assert_eq!(throttle.max_wait(&timeouts), Duration::from_secs(60));

        throttle.max_wait_secs = Some(3600);
        assert_eq!(throttle.max_wait(&timeouts), Duration::from_secs(270));

        let tight = TimeoutConfig { request_secs: 10, upstream_secs: 30, ..TimeoutConfig::default() };
        assert_eq!(tight.retry_window(), Duration::ZERO);
    }
}
