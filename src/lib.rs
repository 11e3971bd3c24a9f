//! GitHub API gateway with rate-limit aware retries.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use resilience::{RetryCoordinator, ThrottlePolicy};
