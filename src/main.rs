//! advisory-gateway
//!
//! Re-exposes part of the GitHub REST API (security advisories, commits,
//! releases, pull requests) behind simplified query-parameter endpoints,
//! retrying rate-limited calls according to the throttle policy.
//!
//! ```text
//!   Client ──▶ http::server ──▶ routing::translator ──▶ resilience::retries ──▶ upstream::client ──▶ GitHub
//!          ◀── http::response ◀──────────────── UpstreamOutcome ◀──────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use advisory_gateway::config::loader::load_config;
use advisory_gateway::lifecycle::startup;
use advisory_gateway::observability::init_logging;

#[derive(Parser)]
#[command(name = "advisory-gateway", version)]
#[command(about = "HTTP gateway for GitHub advisories, commits, releases and pull requests")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "advisory-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
