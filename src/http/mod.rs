//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (assign x-request-id)
//!     → server.rs (endpoint handler)
//!     → [routing::translator builds the upstream path]
//!     → [resilience::retries runs the upstream call]
//!     → response.rs (relay outcome as JSON)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::GatewayServer;
