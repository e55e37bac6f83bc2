//! Reservation store abstraction.
//!
//! The store owns bookings, spaces and lots. None of its operations are
//! transactional with the distributed lock: callers must hold
//! `spot-lock:{space}` before flipping a space to occupied or assigning it
//! to a booking.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! store can be shared as `Arc<dyn ReservationStore>` and captured by effects.

use crate::error::StoreError;
use crate::types::{
    Booking, BookingId, BookingStatus, LotId, RequesterId, Space, SpaceDescription, SpaceId,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Persistence operations consumed by check-in and check-out.
pub trait ReservationStore: Send + Sync {
    /// Free spaces in `lot_id`: not flagged occupied and held by no booking
    /// in `active` or `checked-in` state, in a stable order (space number).
    ///
    /// The result is a point-in-time shortlist, not a guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn query_unreserved_spaces(&self, lot_id: LotId) -> StoreFuture<'_, Vec<SpaceId>>;

    /// Load a booking owned by `requester_id`.
    ///
    /// Returns `Ok(None)` when no booking matches both the reference and the
    /// requester.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get_booking(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
    ) -> StoreFuture<'_, Option<Booking>>;

    /// Assign a lot/space to a booking and move it to `status`.
    ///
    /// Moving to `active` also stamps the check-in time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the booking does not exist, or
    /// another [`StoreError`] if the write fails.
    fn update_booking_assignment(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
        status: BookingStatus,
    ) -> StoreFuture<'_, ()>;

    /// Undo a check-in assignment: back to `pending` with no check-in time,
    /// pointing at `lot_id`/`space_id` again (the assignment it had before).
    ///
    /// Reverting an already reverted booking is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn revert_booking_assignment(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
    ) -> StoreFuture<'_, ()>;

    /// Set a booking's lifecycle state without touching its assignment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn set_booking_status(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        status: BookingStatus,
    ) -> StoreFuture<'_, ()>;

    /// Load a space.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the space does not exist.
    fn get_space(&self, space_id: SpaceId) -> StoreFuture<'_, Space>;

    /// Lot name, space number and floor for notification text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the space does not exist.
    fn describe_space(&self, space_id: SpaceId) -> StoreFuture<'_, SpaceDescription>;

    /// Write a space's occupancy flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn set_space_occupied(&self, space_id: SpaceId, occupied: bool) -> StoreFuture<'_, ()>;
}
