//! Exponential backoff with jitter for transport retries.
//!
//! Rate-limit retries never use this: their delay comes from the upstream's
//! retry-after hint.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::ThrottleConfig;

/// Budget and backoff curve for retrying transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl TransportRetry {
    /// No transport retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self {
            max_retries: config.transport_retries,
            base_delay_ms: config.transport_base_delay_ms,
            max_delay_ms: config.transport_max_delay_ms,
        }
    }

    /// Whether a request that already took `taken` transport retries may take another.
    pub fn allows(&self, taken: u32) -> bool {
        taken < self.max_retries
    }

    /// Delay before transport retry number `retry` (1-based).
    ///
    /// Doubles from `base_delay_ms`, capped at `max_delay_ms`, plus up to 10%
    /// jitter so requests failing together do not reconnect together.
    pub fn delay(&self, retry: u32) -> Duration {
        let Some(doublings) = retry.checked_sub(1) else {
            return Duration::ZERO;
        };

        let capped = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(doublings))
            .min(self.max_delay_ms);

        let jitter = match capped / 10 {
            0 => 0,
            range => rand::thread_rng().gen_range(0..range),
        };

        Duration::from_millis(capped + jitter)
    }
}
