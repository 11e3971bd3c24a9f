//! Retry coordinator.
//!
//! # Responsibilities
//! - Invoke the upstream client for one outbound request
//! - On a rate-limit signal, consult the throttle policy and either wait and
//!   reissue or give up
//! - Emit a throttle event for every scheduled retry and every give-up
//! - Optionally retry transport failures with their own backoff budget
//!
//! # State Machine
//! ```text
//! Attempting → Terminated(Success)     upstream 2xx
//! Attempting → Terminated(Failure)     non-rate-limit error, or GiveUp
//! Attempting → AwaitingRetryDelay      Retry(delay)
//! AwaitingRetryDelay → Attempting      delay elapsed
//! AwaitingRetryDelay → Terminated      shutdown while waiting
//! ```
//!
//! `retry_count` is bumped once for every rate-limited attempt before the
//! policy is consulted, so the policy sees 1 on the first hit and the
//! request makes at most `retry_limit + 1` attempts.
//!
//! All mutable state lives in the `OutboundRequest` owned by the call; the
//! coordinator itself is shared read-only between requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::schema::{ThrottleConfig, TimeoutConfig};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::backoff::TransportRetry;
use crate::resilience::events::{ThrottleEvent, ThrottleObserver};
use crate::resilience::policy::{RateLimitSignal, ThrottleDecision, ThrottlePolicy};
use crate::upstream::client::Upstream;
use crate::upstream::types::{
    Failure, FailureKind, OutboundRequest, UpstreamError, UpstreamOutcome,
};

/// Wraps an upstream client with rate-limit aware retries.
pub struct RetryCoordinator<U> {
    upstream: U,
    policy: ThrottlePolicy,
    observer: Arc<dyn ThrottleObserver>,
    transport: TransportRetry,
    max_wait: Option<Duration>,
    shutdown: Option<Shutdown>,
}

impl<U: Upstream> RetryCoordinator<U> {
    pub fn new(upstream: U, policy: ThrottlePolicy, observer: Arc<dyn ThrottleObserver>) -> Self {
        Self {
            upstream,
            policy,
            observer,
            transport: TransportRetry::disabled(),
            max_wait: None,
            shutdown: None,
        }
    }

    /// Build from the `[throttle]` and `[timeouts]` config sections.
    ///
    /// Retry delays are always bounded so that a request gives up with a
    /// rate-limit failure before the inbound request timeout would cut it off.
    pub fn from_config(
        upstream: U,
        throttle: &ThrottleConfig,
        timeouts: &TimeoutConfig,
        observer: Arc<dyn ThrottleObserver>,
    ) -> Self {
        Self::new(upstream, ThrottlePolicy::new(throttle.retry_limit), observer)
            .with_transport_retries(TransportRetry::from_config(throttle))
            .with_max_wait(Some(throttle.max_wait(timeouts)))
    }

    pub fn with_transport_retries(mut self, transport: TransportRetry) -> Self {
        self.transport = transport;
        self
    }

    /// Bound on how long after the first attempt a retry delay may end.
    /// Applies to requests that do not carry their own deadline.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Cut retry delays short when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// Run the request to a terminal outcome.
    pub async fn execute(&self, mut request: OutboundRequest) -> UpstreamOutcome {
        let method = request.method.to_string();
        let mut attempts = 0u32;
        let mut shutdown_rx = self.shutdown.as_ref().map(Shutdown::subscribe);
        if request.deadline.is_none() {
            request.deadline = self.max_wait.map(|wait| Instant::now() + wait);
        }

        loop {
            attempts += 1;
            let err = match self.upstream.send(&request).await {
                Ok(response) => {
                    metrics::record_upstream_attempt("success");
                    return UpstreamOutcome::Success(response);
                }
                Err(err) => err,
            };

            let Some(signal) = RateLimitSignal::from_error(&err) else {
                if let Some(delay) = self.transport_retry_delay(&mut request, &err) {
                    metrics::record_upstream_attempt("transport_retry");
                    tracing::info!(
                        method = %method,
                        path = %request.path,
                        retry = request.transport_retries,
                        delay = ?delay,
                        error = %err,
                        "Retrying after transport error"
                    );
                    if !pause(delay, &mut shutdown_rx).await {
                        return cancelled(None, attempts);
                    }
                    continue;
                }

                metrics::record_upstream_attempt("failure");
                tracing::debug!(method = %method, path = %request.path, error = %err, "Upstream call failed");
                return UpstreamOutcome::Failure(failure(err, attempts));
            };

            metrics::record_upstream_attempt("rate_limited");
            request.retry_count += 1;
            let kind = signal.kind();

            match self.policy.decide(signal, request.retry_count) {
                ThrottleDecision::Retry(delay) if fits_deadline(request.deadline, delay) => {
                    self.observer.on_event(&ThrottleEvent::retry_scheduled(
                        &method,
                        &request.path,
                        request.retry_count,
                        kind,
                        delay,
                    ));
                    if !pause(delay, &mut shutdown_rx).await {
                        return cancelled(signal.retry_after_secs(), attempts);
                    }
                }
                decision => {
                    if decision != ThrottleDecision::GiveUp {
                        tracing::debug!(
                            method = %method,
                            path = %request.path,
                            "Retry delay would pass the request deadline"
                        );
                    }
                    self.observer.on_event(&ThrottleEvent::gave_up(
                        &method,
                        &request.path,
                        request.retry_count,
                        kind,
                    ));
                    return UpstreamOutcome::Failure(failure(err, attempts));
                }
            }
        }
    }

    fn transport_retry_delay(
        &self,
        request: &mut OutboundRequest,
        err: &UpstreamError,
    ) -> Option<Duration> {
        if !matches!(err, UpstreamError::Transport { .. })
            || !self.transport.allows(request.transport_retries)
        {
            return None;
        }
        let delay = self.transport.delay(request.transport_retries + 1);
        if !fits_deadline(request.deadline, delay) {
            return None;
        }
        request.transport_retries += 1;
        Some(delay)
    }
}

fn fits_deadline(deadline: Option<Instant>, delay: Duration) -> bool {
    deadline.map_or(true, |d| Instant::now() + delay <= d)
}

/// Sleep for `delay`. Returns false if shutdown fired first.
async fn pause(delay: Duration, shutdown: &mut Option<broadcast::Receiver<()>>) -> bool {
    match shutdown {
        Some(rx) => tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = rx.recv() => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

fn failure(err: UpstreamError, attempts: u32) -> Failure {
    Failure {
        attempts,
        ..Failure::from(err)
    }
}

fn cancelled(retry_after_secs: Option<u64>, attempts: u32) -> UpstreamOutcome {
    UpstreamOutcome::Failure(Failure {
        retry_after_secs,
        attempts,
        ..Failure::new(FailureKind::Cancelled, "retry delay cancelled by shutdown")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::events::{RecordingObserver, ThrottleAction};
    use crate::resilience::policy::LimitKind;
    use crate::upstream::types::UpstreamResponse;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Upstream that replays a fixed script, then answers 200.
    struct ScriptedUpstream {
        script: Mutex<VecDeque<UpstreamError>>,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl ScriptedUpstream {
        fn new(script: Vec<UpstreamError>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Upstream for ScriptedUpstream {
        async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.script.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(UpstreamResponse {
                    status: StatusCode::OK,
                    body: serde_json::json!([{"ghsa_id": "GHSA-xxxx-yyyy-zzzz"}]),
                }),
            }
        }
    }

    fn primary(secs: u64) -> UpstreamError {
        UpstreamError::RateLimitPrimary { retry_after_secs: secs }
    }

    fn secondary() -> UpstreamError {
        UpstreamError::RateLimitSecondary { retry_after_secs: Some(30) }
    }

    fn coordinator(
        script: Vec<UpstreamError>,
    ) -> (RetryCoordinator<ScriptedUpstream>, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        let coordinator = RetryCoordinator::new(
            ScriptedUpstream::new(script),
            ThrottlePolicy::default(),
            observer.clone(),
        );
        (coordinator, observer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_twice_then_success() {
        let (coordinator, observer) = coordinator(vec![primary(1), primary(1)]);
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        assert!(outcome.is_success());
        assert_eq!(coordinator.upstream().attempts(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_retry() && e.limit_kind == LimitKind::Primary));
        assert_eq!(events[0].retry_count, 1);
        assert_eq!(events[1].retry_count, 2);
        assert_eq!(events[0].request_method, "GET");
        assert_eq!(events[0].request_path, "/advisories");
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_exhausts_after_three_attempts() {
        let (coordinator, observer) =
            coordinator(vec![primary(1), primary(1), primary(1), primary(1)]);
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/pull")).await;

        let UpstreamOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.retry_after_secs, Some(1));
        assert_eq!(failure.message, "primary rate limit exceeded, retry after 1s");
        assert_eq!(failure.attempts, 3);
        assert_eq!(coordinator.upstream().attempts(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let events = observer.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].action, ThrottleAction::GaveUp);
        assert_eq!(events[2].retry_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_gives_up_immediately() {
        let (coordinator, observer) = coordinator(vec![secondary()]);
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/commit")).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::RateLimited));
        assert_eq!(coordinator.upstream().attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let events = observer.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].limit_kind, LimitKind::Secondary);
        assert_eq!(events[0].action, ThrottleAction::GaveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_propagates_untouched() {
        let not_found = UpstreamError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Not Found".into(),
        };
        let (coordinator, observer) = coordinator(vec![not_found]);
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/release")).await;

        let UpstreamOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::Upstream);
        assert_eq!(failure.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(failure.message, "upstream returned 404 Not Found: Not Found");
        assert_eq!(failure.attempts, 1);
        assert_eq!(coordinator.upstream().attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_reuse_path_and_headers() {
        let (coordinator, _) = coordinator(vec![primary(0)]);
        let request = OutboundRequest::get("/advisories?cve_id=CVE-2024-0001").with_header(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );

        assert!(coordinator.execute(request).await.is_success());

        let seen = coordinator.upstream().seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].path, seen[1].path);
        assert_eq!(seen[0].headers, seen[1].headers);
        assert_eq!(seen[0].retry_count, 0);
        assert_eq!(seen[1].retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_not_retried_by_default() {
        let (coordinator, observer) = coordinator(vec![UpstreamError::Transport {
            message: "connection refused".into(),
            timeout: false,
        }]);

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(coordinator.upstream().attempts(), 1);
        assert!(observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_retries_use_separate_budget() {
        let transport = || UpstreamError::Transport { message: "reset".into(), timeout: false };
        let (coordinator, observer) =
            coordinator(vec![transport(), primary(1), transport(), primary(1)]);
        let coordinator = coordinator.with_transport_retries(TransportRetry {
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        });

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        assert!(outcome.is_success());
        assert_eq!(coordinator.upstream().attempts(), 5);
        let seen = coordinator.upstream().seen.lock().unwrap().clone();
        assert_eq!(seen[4].retry_count, 2);
        assert_eq!(seen[4].transport_retries, 2);
        assert_eq!(observer.events().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_past_deadline_gives_up() {
        let (coordinator, observer) = coordinator(vec![primary(60)]);
        let coordinator = coordinator.with_max_wait(Some(Duration::from_secs(5)));
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        let UpstreamOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.retry_after_secs, Some(60));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(coordinator.upstream().attempts(), 1);
        assert_eq!(observer.events()[0].action, ThrottleAction::GaveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_retry_delay() {
        let shutdown = Shutdown::new();
        let (coordinator, _) = coordinator(vec![primary(60)]);
        let coordinator = coordinator.with_shutdown(shutdown.clone());
        let start = Instant::now();

        let (outcome, _) = tokio::join!(
            coordinator.execute(OutboundRequest::get("/advisories")),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                shutdown.trigger();
            }
        );

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(coordinator.upstream().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_do_not_share_counters() {
        let (coordinator, observer) = coordinator(vec![primary(1), primary(1)]);
        let coordinator = Arc::new(coordinator);
        let start = Instant::now();

        let a = coordinator.execute(OutboundRequest::get("/a"));
        let b = coordinator.execute(OutboundRequest::get("/b"));
        let (a, b) = tokio::join!(a, b);

        assert!(a.is_success());
        assert!(b.is_success());
        assert!(observer.events().iter().all(|e| e.retry_count == 1));
        // Both 1s delays ran side by side.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_give_up_counts_every_attempt_and_keeps_message() {
        let transport = UpstreamError::Transport { message: "reset".into(), timeout: false };
        let (coordinator, _) = coordinator(vec![transport, primary(1), primary(1), primary(1)]);
        let coordinator = coordinator.with_transport_retries(TransportRetry {
            max_retries: 1,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        });

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        let UpstreamOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.message, "primary rate limit exceeded, retry after 1s");
        assert_eq!(coordinator.upstream().attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_on_first_try_is_one_attempt() {
        let (coordinator, _) = coordinator(vec![secondary()]);

        let UpstreamOutcome::Failure(failure) =
            coordinator.execute(OutboundRequest::get("/commit")).await
        else {
            panic!("expected failure");
        };
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.message, "secondary rate limit exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_bounds_delays_by_request_timeout() {
        let observer = Arc::new(RecordingObserver::new());
        let timeouts = TimeoutConfig { request_secs: 60, upstream_secs: 30, ..TimeoutConfig::default() };
        let coordinator = RetryCoordinator::from_config(
            ScriptedUpstream::new(vec![primary(45)]),
            &ThrottleConfig::default(),
            &timeouts,
            observer.clone(),
        );
        let start = Instant::now();

        let outcome = coordinator.execute(OutboundRequest::get("/advisories")).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::RateLimited));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(coordinator.upstream().attempts(), 1);
        assert_eq!(observer.events()[0].action, ThrottleAction::GaveUp);
    }
}
