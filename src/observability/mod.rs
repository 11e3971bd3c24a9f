//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and the retry coordinator produce:
//!     → logging.rs (structured log events, throttle warnings)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogObserver};
