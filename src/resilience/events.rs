//! Throttle warning events.
//!
//! The coordinator emits one `ThrottleEvent` each time a primary retry is
//! scheduled and each time it gives up on a rate limit. Where the event goes
//! is up to the `ThrottleObserver` it was built with.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::resilience::policy::LimitKind;

/// What the coordinator did about the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ThrottleAction {
    RetryScheduled { delay_secs: u64 },
    GaveUp,
}

/// Structured warning record for a rate-limit hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottleEvent {
    pub request_method: String,
    pub request_path: String,
    pub retry_count: u32,
    pub limit_kind: LimitKind,
    pub action: ThrottleAction,
}

impl ThrottleEvent {
    pub fn is_retry(&self) -> bool {
        matches!(self.action, ThrottleAction::RetryScheduled { .. })
    }

    pub(crate) fn retry_scheduled(
        method: &str,
        path: &str,
        retry_count: u32,
        limit_kind: LimitKind,
        delay: Duration,
    ) -> Self {
        Self {
            request_method: method.to_string(),
            request_path: path.to_string(),
            retry_count,
            limit_kind,
            action: ThrottleAction::RetryScheduled { delay_secs: delay.as_secs() },
        }
    }

    pub(crate) fn gave_up(method: &str, path: &str, retry_count: u32, limit_kind: LimitKind) -> Self {
        Self {
            request_method: method.to_string(),
            request_path: path.to_string(),
            retry_count,
            limit_kind,
            action: ThrottleAction::GaveUp,
        }
    }
}

/// Sink for throttle events.
pub trait ThrottleObserver: Send + Sync {
    fn on_event(&self, event: &ThrottleEvent);
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ThrottleEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ThrottleEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ThrottleObserver for RecordingObserver {
    fn on_event(&self, event: &ThrottleEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
