//! Prometheus metrics for the check-in pipeline.
//!
//! [`MetricsServer::start`] installs the global recorder and describes every
//! series this workspace emits; the server binary serves
//! [`MetricsServer::render`] at `/metrics`. Code that records goes through
//! the small recorder structs below so names and labels stay in one place.
//!
//! ```rust,no_run
//! use smart_parking_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut metrics = MetricsServer::new("0.0.0.0:9090".parse()?);
//! metrics.start()?;
//! let scrape = metrics.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Buckets for every `*duration_seconds` histogram, from 5 ms to 30 s.
const LATENCY_BUCKETS: [f64; 12] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Recorder installation failures.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The bucket configuration was rejected
    #[error("Invalid Prometheus exporter configuration: {0}")]
    Build(String),
    /// Another recorder could not be replaced
    #[error("Prometheus recorder could not be installed: {0}")]
    Install(String),
}

/// Owns the Prometheus recorder handle and the scrape address.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Server for `addr`; nothing is installed until [`start`](Self::start).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and describe every series.
    ///
    /// A recorder installed earlier in the process (several tests in one
    /// binary) leaves this server without a handle but is not an error.
    ///
    /// # Errors
    ///
    /// [`MetricsError`] when the exporter rejects its configuration or
    /// cannot be installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let installed = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &LATENCY_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install_recorder();

        let handle = match installed {
            Ok(handle) => handle,
            Err(e) if e.to_string().contains("already initialized") => {
                tracing::warn!("Metrics recorder already installed in this process");
                return Ok(());
            },
            Err(e) => return Err(MetricsError::Install(e.to_string())),
        };

        describe_all();
        self.handle = Some(handle);
        tracing::info!(addr = %self.addr, "Metrics recorder installed");
        Ok(())
    }

    /// Where `/metrics` should be served.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Recorder handle, once [`start`](Self::start) installed one.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Prometheus text exposition, `None` before a successful start.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_all() {
    describe_counter!(
        "checkin.requests.enqueued",
        "Check-in requests accepted onto the ingress queue"
    );
    describe_counter!(
        "checkin.requests.rejected",
        "Check-in requests rejected because the ingress queue was full or closed"
    );
    describe_gauge!("checkin.queue.depth", "Requests waiting in the ingress queue");
    describe_counter!("checkin.outcomes", "Finished check-in workflows by outcome");
    describe_gauge!(
        "checkin.admission.in_flight",
        "Workflows currently holding an admission ticket"
    );
    describe_histogram!(
        "checkin.duration_seconds",
        "Time from dequeue to terminal state"
    );
    describe_counter!(
        "checkin.compensations",
        "Booking reverts after a failed occupancy write, by result"
    );
    describe_counter!("spot_lock.acquire", "Spot lock acquisitions by result");
    describe_counter!("spot_lock.release", "Spot lock releases by result");
    describe_counter!("checkout.outcomes", "Check-outs by outcome");
    describe_counter!("store.errors", "Postgres store failures by operation");
    describe_counter!("store.effects.executed", "Reducer effects executed by type");
    describe_counter!("http.requests", "HTTP responses by method and status");
    describe_gauge!("ws.connections", "Open websocket connections");
    describe_counter!("ws.events.published", "Events broadcast to websocket clients by type");
}

/// Check-in metrics recorder.
pub struct CheckInMetrics;

impl CheckInMetrics {
    /// Record an accepted request.
    pub fn record_enqueued(depth: usize) {
        counter!("checkin.requests.enqueued").increment(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!("checkin.queue.depth").set(depth as f64);
    }

    /// Record a rejected request.
    pub fn record_rejected() {
        counter!("checkin.requests.rejected").increment(1);
    }

    /// Record a terminal workflow state.
    pub fn record_outcome(outcome: &'static str, duration: Duration) {
        counter!("checkin.outcomes", "outcome" => outcome).increment(1);
        histogram!("checkin.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record the number of admitted workflows.
    pub fn record_in_flight(in_flight: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("checkin.admission.in_flight").set(in_flight as f64);
    }

    /// Record a compensation attempt.
    pub fn record_compensation(reverted: bool) {
        let result = if reverted { "ok" } else { "failed" };
        counter!("checkin.compensations", "result" => result).increment(1);
    }
}

/// Check-out metrics recorder.
pub struct CheckOutMetrics;

impl CheckOutMetrics {
    /// Record a finished check-out (`completed` or an error kind).
    pub fn record_outcome(outcome: &'static str) {
        counter!("checkout.outcomes", "outcome" => outcome).increment(1);
    }
}

/// Spot lock metrics recorder.
pub struct SpotLockMetrics;

impl SpotLockMetrics {
    /// Record an acquisition attempt (`acquired`, `unavailable` or `error`).
    pub fn record_acquire(result: &'static str) {
        counter!("spot_lock.acquire", "result" => result).increment(1);
    }

    /// Record a release (`released`, `not_held` or `error`).
    pub fn record_release(result: &'static str) {
        counter!("spot_lock.release", "result" => result).increment(1);
    }
}
