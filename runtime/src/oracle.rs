//! Spot availability oracle.
//!
//! Thin accessor over the [`ReservationStore`] that puts every call under the
//! per-step store timeout. None of these calls are atomic with the spot lock:
//! callers hold `spot-lock:{space}` and re-read [`is_occupied`] after taking
//! it, before any occupancy or assignment write.
//!
//! [`is_occupied`]: SpotAvailabilityOracle::is_occupied

use smart_parking_core::error::StoreError;
use smart_parking_core::store::{ReservationStore, StoreFuture};
use smart_parking_core::types::{
    Booking, BookingId, BookingStatus, LotId, RequesterId, SpaceDescription, SpaceId,
};
use std::sync::Arc;
use std::time::Duration;

/// Timeout-bounded view of spaces and bookings.
#[derive(Clone)]
pub struct SpotAvailabilityOracle {
    store: Arc<dyn ReservationStore>,
    timeout: Duration,
}

impl SpotAvailabilityOracle {
    /// Wrap `store`, bounding each call by `timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn bounded<T>(&self, op: &'static str, call: StoreFuture<'_, T>) -> Result<T, StoreError> {
        if let Ok(result) = tokio::time::timeout(self.timeout, call).await {
            result
        } else {
            tracing::warn!(op, timeout_ms = self.timeout.as_millis(), "Store call timed out");
            Err(StoreError::Timeout(self.timeout))
        }
    }

    /// Whether the space is physically occupied right now.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown space, or any other
    /// [`StoreError`] from the store or the timeout.
    pub async fn is_occupied(&self, space_id: SpaceId) -> Result<bool, StoreError> {
        let space = self
            .bounded("get_space", self.store.get_space(space_id))
            .await?;
        Ok(space.occupied)
    }

    /// Write the space's occupancy flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or times out.
    pub async fn set_occupied(&self, space_id: SpaceId, occupied: bool) -> Result<(), StoreError> {
        self.bounded(
            "set_space_occupied",
            self.store.set_space_occupied(space_id, occupied),
        )
        .await
    }

    /// Zone, label and floor of a space, for notification text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown space.
    pub async fn describe(&self, space_id: SpaceId) -> Result<SpaceDescription, StoreError> {
        self.bounded("describe_space", self.store.describe_space(space_id))
            .await
    }

    /// Spaces of `lot_id` that no active booking holds, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or times out.
    pub async fn unreserved_spaces(&self, lot_id: LotId) -> Result<Vec<SpaceId>, StoreError> {
        self.bounded(
            "query_unreserved_spaces",
            self.store.query_unreserved_spaces(lot_id),
        )
        .await
    }

    /// Booking owned by `requester_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or times out.
    pub async fn booking(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
    ) -> Result<Option<Booking>, StoreError> {
        self.bounded("get_booking", self.store.get_booking(booking_id, requester_id))
            .await
    }

    /// Point the booking at `space_id` and make it `active`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or times out.
    pub async fn assign(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
    ) -> Result<(), StoreError> {
        self.bounded(
            "update_booking_assignment",
            self.store.update_booking_assignment(
                booking_id,
                requester_id,
                lot_id,
                space_id,
                BookingStatus::Active,
            ),
        )
        .await
    }

    /// Undo [`assign`](Self::assign), putting `prior`'s lot and space back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or times out.
    pub async fn revert(&self, prior: &Booking) -> Result<(), StoreError> {
        self.bounded(
            "revert_booking_assignment",
            self.store.revert_booking_assignment(
                prior.id,
                prior.requester_id,
                prior.lot_id,
                prior.space_id,
            ),
        )
        .await
    }

    /// Mark the booking `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or times out.
    pub async fn complete(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
    ) -> Result<(), StoreError> {
        self.bounded(
            "set_booking_status",
            self.store
                .set_booking_status(booking_id, requester_id, BookingStatus::Completed),
        )
        .await
    }
}
