//! Upstream API subsystem.
//!
//! # Data Flow
//! ```text
//! OutboundRequest (path + protocol headers)
//!     → client.rs (single reqwest call, credentials attached)
//!     → classify.rs (non-2xx → RateLimitPrimary / RateLimitSecondary / Status)
//!     → Result<UpstreamResponse, UpstreamError>
//! ```
//!
//! # Design Decisions
//! - Response shapes are resolved into tagged variants once, here
//! - The client never retries; that belongs to `resilience::retries`
//! - The client handle is immutable and shared via `Arc`

pub mod classify;
pub mod client;
pub mod types;

pub use client::{GitHubClient, Upstream};
pub use types::{
    Failure, FailureKind, OutboundRequest, UpstreamError, UpstreamOutcome, UpstreamResponse,
};
