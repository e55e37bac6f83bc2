//! Health check endpoints.
//!
//! `/health` is liveness only. `/health/ready` reports the check-in
//! pipeline's load and turns 503 once the ingress queue has closed, so a
//! load balancer stops routing to an instance that is draining.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Liveness probe.
///
/// ```text
/// GET /health  ->  200 "ok"
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness body.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// `ready` or `draining`
    pub status: &'static str,
    /// Requests waiting in the ingress queue
    pub queue_depth: usize,
    /// Ingress queue capacity
    pub queue_capacity: usize,
    /// Workflows holding an admission ticket
    pub in_flight: usize,
    /// Admission gate capacity
    pub gate_capacity: usize,
    /// Connected websocket clients
    pub subscribers: usize,
}

/// Readiness probe with pipeline diagnostics.
///
/// # Status Codes
///
/// - 200 OK: accepting check-ins
/// - 503 Service Unavailable: the ingress queue is closed
///
/// ```json
/// {
///   "status": "ready",
///   "queue_depth": 3,
///   "queue_capacity": 100,
///   "in_flight": 7,
///   "gate_capacity": 50,
///   "subscribers": 2
/// }
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let closed = state.ingress.is_closed();
    let body = Readiness {
        status: if closed { "draining" } else { "ready" },
        queue_depth: state.ingress.depth(),
        queue_capacity: state.ingress.capacity(),
        in_flight: state.gate.in_flight(),
        gate_capacity: state.gate.capacity(),
        subscribers: state.events.subscribers(),
    };
    let status = if closed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body))
}
