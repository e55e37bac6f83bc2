//! Error taxonomy.
//!
//! Collaborator errors ([`StoreError`], [`LockError`], [`NotifyError`]) are
//! returned by the trait implementations. [`CheckInError`] is the closed set
//! of terminal failures a check-in workflow can end in; everything else is
//! handled inside the workflow.

use crate::types::BookingStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors from the reservation store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record type (`booking`, `space`)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The backing database failed
    #[error("Database error: {0}")]
    Database(String),

    /// The call did not finish within its budget
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Convenience constructor for [`StoreError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors from the distributed lock service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Someone else holds the key
    #[error("Lock unavailable: {key}")]
    LockUnavailable {
        /// Resource key
        key: String,
    },

    /// Release was called for a lock this handle no longer owns
    #[error("Lock not held: {key}")]
    LockNotHeld {
        /// Resource key
        key: String,
    },

    /// The lock backend failed
    #[error("Lock backend error: {0}")]
    Backend(String),
}

/// Errors delivering a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Delivery failed
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Terminal failure of a check-in workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckInError {
    /// The admission gate stayed full for the whole admission timeout
    #[error("Admission timed out after {0:?}")]
    AdmissionTimeout(Duration),

    /// No booking matches the reference and requester
    #[error("Booking not found")]
    BookingNotFound,

    /// Only `pending` bookings can be checked in
    #[error("Booking is {0}, only pending bookings can check in")]
    BookingNotPending(BookingStatus),

    /// Neither the original space nor any alternative could be claimed
    #[error("No available parking spot")]
    NoAvailableSpot,

    /// Writing the new assignment to the booking failed
    #[error("Failed to update booking: {0}")]
    BookingUpdateError(String),

    /// Marking the space occupied failed (booking revert attempted)
    #[error("Failed to update parking space: {0}")]
    SpaceUpdateError(String),

    /// A store read failed where no fallback exists
    #[error("Store error: {0}")]
    Store(String),
}

impl CheckInError {
    /// Stable label for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AdmissionTimeout(_) => "admission_timeout",
            Self::BookingNotFound => "booking_not_found",
            Self::BookingNotPending(_) => "booking_not_pending",
            Self::NoAvailableSpot => "no_available_spot",
            Self::BookingUpdateError(_) => "booking_update_error",
            Self::SpaceUpdateError(_) => "space_update_error",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for CheckInError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity: "booking", .. } => Self::BookingNotFound,
            other => Self::Store(other.to_string()),
        }
    }
}
