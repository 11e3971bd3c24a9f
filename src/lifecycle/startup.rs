//! Startup orchestration.
//!
//! Order: metrics exporter, upstream client and coordinator, listener,
//! signal handler, then serve. Any startup error is fatal.

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::GatewayServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Start the gateway and serve until a termination signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::from_config(config, &shutdown)?;

    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
