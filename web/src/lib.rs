//! HTTP surface of the smart-parking check-in service.
//!
//! # Routes
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /api/reservations/:id/checkin`  | enqueue a check-in, 202 |
//! | `POST /api/reservations/:id/checkout` | complete a booking, 200 |
//! | `GET /ws`            | notification and parking-update stream |
//! | `GET /health`        | liveness |
//! | `GET /health/ready`  | readiness with queue and gate diagnostics |
//!
//! # Request Flow
//!
//! ```text
//! POST checkin ──> IngressQueue ──> CheckInOrchestrator (background)
//!                                          │
//!                                          ▼
//!                                      EventHub ──> /ws clients
//! ```
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(ingress, checkout, orchestrator.gate().clone(), events);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, smart_parking_web::router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use events::{EventHub, WsEvent};
pub use extractors::{CorrelationId, Requester, USER_ID_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, request_context_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/reservations/:id/checkin",
            post(handlers::check_in),
        )
        .route(
            "/api/reservations/:id/checkout",
            post(handlers::check_out),
        )
        .route("/ws", get(handlers::websocket::handle))
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness))
        .layer(TraceLayer::new_for_http())
        .layer(request_context_layer())
        .with_state(state)
}
