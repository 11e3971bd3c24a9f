//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by endpoint, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_upstream_attempts_total` (counter): upstream calls by result
//! - `gateway_rate_limit_events_total` (counter): throttle events by kind, action
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(result: &'static str) {
    metrics::counter!("gateway_upstream_attempts_total", "result" => result).increment(1);
}

pub fn record_rate_limit_event(kind: &'static str, action: &'static str) {
    metrics::counter!("gateway_rate_limit_events_total", "kind" => kind, "action" => action)
        .increment(1);
}
