//! HTTP server setup and handlers.
//!
//! # Responsibilities
//! - Create the Axum Router with one handler per local endpoint
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Translate query parameters, run the retry coordinator, relay the outcome
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::observability::{metrics, LogObserver};
use crate::resilience::RetryCoordinator;
use crate::routing::{
    advisories_path, advisory_details_path, commit_path, pull_path, release_path,
    AdvisoriesQuery, AdvisoryDetailsQuery, CommitQuery, PullQuery, ReleaseQuery, TranslateError,
};
use crate::upstream::client::{ClientError, GitHubClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RetryCoordinator<GitHubClient>>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server around an existing coordinator.
    pub fn new(config: GatewayConfig, coordinator: Arc<RetryCoordinator<GitHubClient>>) -> Self {
        let state = AppState { coordinator };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the upstream client and coordinator from config, then the server.
    ///
    /// Retry delays in flight are cancelled when `shutdown` fires.
    pub fn from_config(config: GatewayConfig, shutdown: &Shutdown) -> Result<Self, ClientError> {
        let client = GitHubClient::new(
            &config.upstream,
            &config.timeouts,
            config.throttle.default_retry_after_secs,
        )?;
        let coordinator = RetryCoordinator::from_config(
            client,
            &config.throttle,
            &config.timeouts,
            Arc::new(LogObserver),
        )
        .with_shutdown(shutdown.clone());

        let policy = coordinator.policy();
        tracing::info!(
            retry_limit = policy.retry_limit(),
            max_attempts = policy.max_attempts(),
            max_wait = ?config.throttle.max_wait(&config.timeouts),
            transport_retries = config.throttle.transport_retries,
            "Retry coordinator ready"
        );

        Ok(Self::new(config, Arc::new(coordinator)))
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run top to bottom on the way in: the request ID is assigned
    /// first so the trace span and the response both carry it.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route("/advisories", get(advisories))
            .route("/advisory_details", get(advisory_details))
            .route("/commit", get(commit))
            .route("/release", get(release))
            .route("/pull", get(pull))
            .route("/health", get(health))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn advisories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdvisoriesQuery>,
) -> Response {
    forward(&state, "advisories", &headers, advisories_path(&query)).await
}

async fn advisory_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdvisoryDetailsQuery>,
) -> Response {
    forward(&state, "advisory_details", &headers, advisory_details_path(&query)).await
}

async fn commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CommitQuery>,
) -> Response {
    forward(&state, "commit", &headers, commit_path(&query)).await
}

async fn release(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReleaseQuery>,
) -> Response {
    forward(&state, "release", &headers, release_path(&query)).await
}

async fn pull(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PullQuery>,
) -> Response {
    forward(&state, "pull", &headers, pull_path(&query)).await
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Shared body of every endpoint: translate, coordinate, relay.
async fn forward(
    state: &AppState,
    endpoint: &'static str,
    headers: &HeaderMap,
    path: Result<String, TranslateError>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(headers);

    let path = match path {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(request_id = %request_id, endpoint, error = %e, "Rejected request parameters");
            metrics::record_request(endpoint, 400, start);
            return response::bad_request(&e);
        }
    };

    tracing::debug!(request_id = %request_id, endpoint, upstream_path = %path, "Forwarding request");

    let request = state.coordinator.upstream().outbound(path);
    let outcome = state.coordinator.execute(request).await;
    if let Some(kind) = outcome.failure_kind() {
        tracing::info!(request_id = %request_id, endpoint, kind = kind.as_str(), "Upstream request failed");
    }

    let response = response::relay(outcome);
    metrics::record_request(endpoint, response.status().as_u16(), start);
    response
}
