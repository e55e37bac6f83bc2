//! Check-in and check-out endpoints.
//!
//! Check-in only enqueues: the 202 says the request is buffered, not that a
//! space was assigned. The outcome reaches the requester over the
//! websocket, or by reading the booking later. Check-out runs inline.

use crate::WebResult;
use crate::extractors::{CorrelationId, Requester};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use smart_parking_core::types::{BookingId, CheckInRequest};
use smart_parking_runtime::CheckOutReceipt;
use uuid::Uuid;

/// Body of a 202 check-in response.
#[derive(Debug, Serialize)]
pub struct CheckInAccepted {
    /// Fixed acknowledgement text
    pub message: &'static str,
    /// Identifier for correlating logs with this request
    pub request_id: Uuid,
    /// When the request was buffered
    pub accepted_at: DateTime<Utc>,
}

/// Body of a 200 check-out response.
#[derive(Debug, Serialize)]
pub struct CheckOutCompleted {
    /// Fixed confirmation text
    pub message: &'static str,
    /// What was completed and freed
    #[serde(flatten)]
    pub receipt: CheckOutReceipt,
}

/// Enqueue a check-in.
///
/// ```text
/// POST /api/reservations/:id/checkin
/// X-User-Id: <uuid>
/// ```
///
/// # Errors
///
/// - 401 if `X-User-Id` is missing or malformed
/// - 503 if the ingress queue is full or closed
#[allow(clippy::unused_async)]
#[tracing::instrument(skip(state, correlation_id), fields(correlation_id = %correlation_id.0))]
pub async fn check_in(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Requester(requester_id): Requester,
    Path(booking_id): Path<BookingId>,
) -> WebResult<(StatusCode, Json<CheckInAccepted>)> {
    let receipt = state.ingress.try_enqueue(CheckInRequest {
        requester_id,
        booking_id,
    })?;

    tracing::info!(
        request_id = %receipt.request_id,
        booking = %booking_id,
        requester = %requester_id,
        "Check-in request accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(CheckInAccepted {
            message: "Check-in request accepted and being processed",
            request_id: receipt.request_id,
            accepted_at: receipt.accepted_at,
        }),
    ))
}

/// Complete a booking and free its space.
///
/// ```text
/// POST /api/reservations/:id/checkout
/// X-User-Id: <uuid>
/// ```
///
/// # Errors
///
/// - 401 if `X-User-Id` is missing or malformed
/// - 404 if the requester has no such booking
/// - 409 if a check-in is holding the space's lock
/// - 500 on lock or store failures
#[tracing::instrument(skip(state, correlation_id), fields(correlation_id = %correlation_id.0))]
pub async fn check_out(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Requester(requester_id): Requester,
    Path(booking_id): Path<BookingId>,
) -> WebResult<Json<CheckOutCompleted>> {
    let receipt = state.checkout.check_out(requester_id, booking_id).await?;

    Ok(Json(CheckOutCompleted {
        message: "Check-out completed",
        receipt,
    }))
}
