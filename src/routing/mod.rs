//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (endpoint + query parameters)
//!     → translator.rs (validate parameters, build upstream path)
//!     → Return: upstream path string or TranslateError
//! ```
//!
//! # Design Decisions
//! - One local endpoint maps to exactly one upstream path template
//! - Deterministic: same parameters always produce the same path
//! - Invalid input never reaches the upstream

pub mod translator;

pub use translator::{
    advisories_path, advisory_details_path, commit_path, pull_path, release_path,
    AdvisoriesQuery, AdvisoryDetailsQuery, CommitQuery, PullQuery, ReleaseQuery, TranslateError,
};
