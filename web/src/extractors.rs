//! Request extractors.
//!
//! Authentication is done by the gateway in front of this service, which
//! forwards the authenticated user as `X-User-Id`. [`Requester`] only
//! checks that the header is present and holds a UUID.

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use smart_parking_core::types::RequesterId;
use std::convert::Infallible;
use uuid::Uuid;

/// Header carrying the authenticated requester id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Who the check-in or check-out is for. 401 when absent or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester(pub RequesterId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, AppError> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Err(AppError::unauthorized("Missing X-User-Id header"));
        };
        value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Invalid X-User-Id header"))
    }
}

/// Correlation id of the current request.
///
/// Normally set by [`request_context_layer`](crate::middleware::request_context_layer).
/// Outside that layer the header is parsed directly, and failing that a
/// new id is minted.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        let from_header = || {
            let raw = parts.headers.get(CORRELATION_ID_HEADER)?.to_str().ok()?;
            Uuid::parse_str(raw).ok()
        };
        let id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(from_header)
            .unwrap_or_else(Uuid::new_v4);
        Ok(Self(id))
    }
}
