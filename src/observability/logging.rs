//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Route throttle events into the log stream
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::metrics;
use crate::resilience::events::{ThrottleAction, ThrottleEvent, ThrottleObserver};

/// Install the global subscriber.
pub fn init_logging(level: &str) {
    let default_filter = format!("advisory_gateway={level},tower_http={level}");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Throttle observer that logs a warning and bumps the rate-limit counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ThrottleObserver for LogObserver {
    fn on_event(&self, event: &ThrottleEvent) {
        match event.action {
            ThrottleAction::RetryScheduled { delay_secs } => {
                tracing::warn!(
                    request_method = %event.request_method,
                    request_path = %event.request_path,
                    retry_count = event.retry_count,
                    limit_kind = %event.limit_kind,
                    delay_secs,
                    "Rate limit hit, retry scheduled"
                );
                metrics::record_rate_limit_event(event.limit_kind.as_str(), "retry");
            }
            ThrottleAction::GaveUp => {
                tracing::warn!(
                    request_method = %event.request_method,
                    request_path = %event.request_path,
                    retry_count = event.retry_count,
                    limit_kind = %event.limit_kind,
                    "Rate limit hit, giving up"
                );
                metrics::record_rate_limit_event(event.limit_kind.as_str(), "give_up");
            }
        }
    }
}
