//! Inputs to the check-in reducer.
//!
//! `Begin` starts the workflow; every other action is the result of an
//! effect the reducer asked for.

use smart_parking_core::lock::LockHandle;
use smart_parking_core::types::{Booking, SpaceId};

/// Actions of the check-in workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInAction {
    /// Start processing an admitted request
    Begin,

    /// The booking exists and belongs to the requester
    BookingLoaded {
        /// Loaded booking
        booking: Booking,
    },

    /// No booking for this reference and requester
    BookingMissing,

    /// Loading the booking failed
    BookingLoadFailed {
        /// Store error
        error: String,
    },

    /// The booked space is now locked by this workflow
    OriginalLockAcquired {
        /// The lock
        lock: LockHandle,
    },

    /// The booked space could not be locked
    OriginalLockUnavailable {
        /// Why (held elsewhere, or lock service error)
        reason: String,
    },

    /// Occupancy of the locked booked space
    OriginalVerified {
        /// Whether it is occupied
        occupied: bool,
    },

    /// Reading the booked space's occupancy failed
    OriginalVerifyFailed {
        /// Store error
        error: String,
    },

    /// The finder locked an alternative
    AlternativeLocked {
        /// The lock
        lock: LockHandle,
        /// The alternative
        space_id: SpaceId,
    },

    /// The finder found nothing it could lock
    AlternativeNotFound {
        /// Store error if the candidate query itself failed
        error: Option<String>,
    },

    /// Occupancy of the locked alternative
    AlternativeVerified {
        /// Whether it is occupied
        occupied: bool,
    },

    /// Reading the alternative's occupancy failed
    AlternativeVerifyFailed {
        /// Store error
        error: String,
    },

    /// Booking now points at the chosen space and is active
    BookingAssigned,

    /// Writing the booking assignment failed
    BookingAssignFailed {
        /// Store error
        error: String,
    },

    /// The chosen space is now marked occupied
    SpaceMarkedOccupied,

    /// Marking the space occupied failed
    SpaceMarkFailed {
        /// Store error
        error: String,
    },

    /// The booking revert finished
    CompensationFinished {
        /// Whether the revert succeeded
        reverted: bool,
    },
}
