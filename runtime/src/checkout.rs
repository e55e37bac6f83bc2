//! Check-out: complete a booking and free its space.
//!
//! Unlike check-in this runs inline with the request. The space's lock is
//! held across both writes so a concurrent check-in cannot observe the
//! booking completed while the space is still marked occupied.

use crate::checkin::CheckInEnvironment;
use crate::metrics::CheckOutMetrics;
use crate::oracle::SpotAvailabilityOracle;
use crate::spot_lock::SpotLocks;
use chrono::{DateTime, Utc};
use serde::Serialize;
use smart_parking_core::environment::Clock;
use smart_parking_core::error::{LockError, StoreError};
use smart_parking_core::notification::{Notification, NotificationKind, Notifier};
use smart_parking_core::types::{
    Booking, BookingId, BookingStatus, LotId, ParkingEvent, RequesterId, SpaceId,
};
use std::sync::Arc;
use thiserror::Error;

/// Why a check-out did not go through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckOutError {
    /// No booking for this reference and requester
    #[error("Booking not found")]
    BookingNotFound,

    /// The booking holds no space to give back
    #[error("Booking is {0}, only active or checked-in bookings can check out")]
    NotCheckedIn(BookingStatus),

    /// A check-in is working on the space right now
    #[error("Space {0} is being processed, try again")]
    SpotBusy(SpaceId),

    /// The lock service failed
    #[error("Lock service error: {0}")]
    Lock(String),

    /// A store read or write failed
    #[error(transparent)]
    Store(StoreError),
}

impl CheckOutError {
    /// Short label for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BookingNotFound => "booking_not_found",
            Self::NotCheckedIn(_) => "not_checked_in",
            Self::SpotBusy(_) => "spot_busy",
            Self::Lock(_) => "lock",
            Self::Store(_) => "store",
        }
    }
}

impl From<StoreError> for CheckOutError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound {
                entity: "booking", ..
            } => Self::BookingNotFound,
            other => Self::Store(other),
        }
    }
}

/// Result of a completed check-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutReceipt {
    /// The completed booking
    pub booking_id: BookingId,
    /// The freed space
    pub space_id: SpaceId,
    /// Lot of the freed space
    pub lot_id: LotId,
    /// When the check-out finished
    pub completed_at: DateTime<Utc>,
}

/// Completes bookings and frees their spaces.
#[derive(Clone)]
pub struct CheckOutService {
    oracle: SpotAvailabilityOracle,
    locks: SpotLocks,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl CheckOutService {
    /// Create a check-out service.
    #[must_use]
    pub fn new(
        oracle: SpotAvailabilityOracle,
        locks: SpotLocks,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            oracle,
            locks,
            notifier,
            clock,
        }
    }

    /// Share the collaborators of a check-in environment.
    #[must_use]
    pub fn from_environment(env: &CheckInEnvironment) -> Self {
        Self::new(
            env.oracle.clone(),
            env.locks.clone(),
            Arc::clone(&env.notifier),
            Arc::clone(&env.clock),
        )
    }

    /// Complete `booking_id` and free its space.
    ///
    /// # Errors
    ///
    /// - [`CheckOutError::BookingNotFound`] if the requester has no such booking
    /// - [`CheckOutError::NotCheckedIn`] if the booking holds no space
    /// - [`CheckOutError::SpotBusy`] if the space's lock is held elsewhere
    /// - [`CheckOutError::Lock`] or [`CheckOutError::Store`] on collaborator failures
    #[tracing::instrument(skip(self), fields(booking = %booking_id, requester = %requester_id))]
    pub async fn check_out(
        &self,
        requester_id: RequesterId,
        booking_id: BookingId,
    ) -> Result<CheckOutReceipt, CheckOutError> {
        let result = self.run(requester_id, booking_id).await;
        match &result {
            Ok(receipt) => {
                CheckOutMetrics::record_outcome("completed");
                tracing::info!(space = %receipt.space_id, "Check-out completed");
            },
            Err(e) => {
                CheckOutMetrics::record_outcome(e.kind());
                tracing::warn!(error = %e, "Check-out failed");
            },
        }
        result
    }

    async fn run(
        &self,
        requester_id: RequesterId,
        booking_id: BookingId,
    ) -> Result<CheckOutReceipt, CheckOutError> {
        let booking = self.holding(requester_id, booking_id).await?;

        let lock = self
            .locks
            .acquire(booking.space_id)
            .await
            .map_err(|e| match e {
                LockError::LockUnavailable { .. } => CheckOutError::SpotBusy(booking.space_id),
                other => CheckOutError::Lock(other.to_string()),
            })?;

        // Re-read under the lock: a concurrent check-out may have finished first.
        let written = match self.holding(requester_id, booking_id).await {
            Ok(current) if current.space_id == booking.space_id => self.free(&current).await,
            Ok(current) => Err(CheckOutError::NotCheckedIn(current.status)),
            Err(e) => Err(e),
        };
        self.locks.release(&lock).await;
        written?;

        let completed_at = self.clock.now();
        self.announce(&booking, completed_at).await;

        Ok(CheckOutReceipt {
            booking_id: booking.id,
            space_id: booking.space_id,
            lot_id: booking.lot_id,
            completed_at,
        })
    }

    /// The requester's booking, provided it currently holds a space.
    async fn holding(
        &self,
        requester_id: RequesterId,
        booking_id: BookingId,
    ) -> Result<Booking, CheckOutError> {
        let booking = self
            .oracle
            .booking(booking_id, requester_id)
            .await?
            .ok_or(CheckOutError::BookingNotFound)?;
        if booking.status.holds_space() {
            Ok(booking)
        } else {
            Err(CheckOutError::NotCheckedIn(booking.status))
        }
    }

    async fn free(&self, booking: &Booking) -> Result<(), CheckOutError> {
        self.oracle.complete(booking.id, booking.requester_id).await?;
        self.oracle.set_occupied(booking.space_id, false).await?;
        Ok(())
    }

    async fn announce(&self, booking: &Booking, at: DateTime<Utc>) {
        let event = ParkingEvent {
            lot_id: booking.lot_id,
            space_id: booking.space_id,
            is_occupied: false,
            is_paid: false,
            timestamp: at,
        };
        if let Err(e) = self.notifier.publish_parking_event(event).await {
            tracing::warn!(space = %booking.space_id, error = %e, "Parking event not delivered");
        }

        let place = self.oracle.describe(booking.space_id).await.ok();
        let kind = NotificationKind::SpaceAvailable;
        let notification = Notification {
            kind,
            message: kind.render(booking.space_id, place.as_ref()),
            space_id: booking.space_id,
            lot_id: Some(booking.lot_id),
            booking_id: Some(booking.id),
            requester_id: Some(booking.requester_id),
            created_at: at,
        };
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(space = %booking.space_id, error = %e, "Availability notification not delivered");
        }
    }
}
