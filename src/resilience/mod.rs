//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! OutboundRequest
//!     → retries.rs (coordinator loop around the upstream client)
//!     → On rate limit: policy.rs (retry after hint, or give up)
//!     → On transport error: backoff.rs (optional, separate budget)
//!     → events.rs (warning event per scheduled retry / give-up)
//!     → UpstreamOutcome
//! ```
//!
//! # Design Decisions
//! - The policy is a pure function; all timing lives in the coordinator
//! - Secondary limits are never retried
//! - Retry delays suspend only the requesting task (tokio sleep)
//! - Rate-limit and transport retries never share a budget

pub mod backoff;
pub mod events;
pub mod policy;
pub mod retries;

pub use events::{ThrottleEvent, ThrottleObserver};
pub use policy::{LimitKind, RateLimitSignal, ThrottleDecision, ThrottlePolicy};
pub use backoff::TransportRetry;
pub use retries::RetryCoordinator;
