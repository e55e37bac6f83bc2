//! HTTP rendering of failures.
//!
//! Handlers return [`AppError`], which always renders as
//! `{ "code": .., "message": .. }`. 5xx responses are logged together with
//! the underlying cause, which never reaches the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use smart_parking_runtime::{CheckOutError, IngressError};
use std::fmt;

/// A failed request: what the client sees plus an optional private cause.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    cause: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Keep `cause` for the server log.
    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// HTTP status the error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable code clients can switch on, e.g. `CONFLICT`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// 401, the requester could not be identified.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 404 for a booking id that does not exist.
    #[must_use]
    pub fn booking_not_found() -> Self {
        Self::with_status(StatusCode::NOT_FOUND, "NOT_FOUND", "Booking not found")
    }

    /// 409, the spot is held by another in-flight operation.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message,
        )
    }

    /// 503, the check-in pipeline is not taking requests.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.cause {
                Some(cause) => tracing::error!(
                    status = self.status.as_u16(),
                    code = self.code,
                    error = %cause,
                    "{}",
                    self.message
                ),
                None => tracing::warn!(
                    status = self.status.as_u16(),
                    code = self.code,
                    "{}",
                    self.message
                ),
            }
        }

        let body = Json(ErrorBody {
            code: self.code,
            message: &self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").caused_by(err)
    }
}

impl From<IngressError> for AppError {
    fn from(err: IngressError) -> Self {
        match err {
            IngressError::QueueFull { .. } => {
                Self::unavailable("Check-in queue is full, try again shortly")
            },
            IngressError::Closed => Self::unavailable("Check-in processing is shutting down"),
        }
    }
}

impl From<CheckOutError> for AppError {
    fn from(err: CheckOutError) -> Self {
        match err {
            CheckOutError::BookingNotFound => Self::booking_not_found(),
            CheckOutError::SpotBusy(space) => Self::conflict(format!(
                "Parking space {space} is being processed, try again"
            )),
            not_held @ CheckOutError::NotCheckedIn(_) => Self::conflict(not_held.to_string()),
            other @ (CheckOutError::Lock(_) | CheckOutError::Store(_)) => {
                Self::internal("Check-out failed").caused_by(other)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_parking_core::error::StoreError;
    use smart_parking_core::types::{BookingStatus, SpaceId};

    #[test]
    fn display_prefixes_the_code() {
        let err = AppError::unauthorized("Missing X-User-Id header");
        assert_eq!(err.to_string(), "[UNAUTHORIZED] Missing X-User-Id header");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn full_and_closed_queues_are_unavailable() {
        for err in [IngressError::QueueFull { capacity: 100 }, IngressError::Closed] {
            let err = AppError::from(err);
            assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
        }
    }

    #[test]
    fn check_out_failures_map_to_statuses() {
        assert_eq!(
            AppError::from(CheckOutError::BookingNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CheckOutError::SpotBusy(SpaceId::new())).code(),
            "CONFLICT"
        );
        let err = AppError::from(CheckOutError::NotCheckedIn(BookingStatus::Completed));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn store_failures_keep_their_cause_private() {
        let err = AppError::from(CheckOutError::Store(StoreError::Database("boom".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.to_string().contains("boom"));
    }
}
