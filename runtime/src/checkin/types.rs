//! State of a single check-in workflow.

use smart_parking_core::error::CheckInError;
use smart_parking_core::lock::LockHandle;
use smart_parking_core::types::{Booking, CheckInRequest, LotId, SpaceId};

/// Progress through the assignment writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignStep {
    /// Writing the new lot/space and `active` to the booking
    UpdatingBooking,
    /// Flipping the space to occupied
    MarkingOccupied,
    /// Reverting the booking after the occupancy write failed
    Compensating {
        /// The occupancy write error
        cause: String,
    },
}

/// Where a check-in currently stands.
///
/// Every non-terminal phase after `LockingOriginal` that names a lock holds
/// it; the lock is released on the transition out of that phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInPhase {
    /// Ticket held, booking being loaded
    Admitted,
    /// Trying the lock on the booked space
    LockingOriginal,
    /// Booked space locked, re-reading its occupancy
    VerifyingOriginal {
        /// Lock on the booked space
        lock: LockHandle,
    },
    /// Asking the finder for another space in the lot
    SearchingAlternative,
    /// Alternative locked, re-reading its occupancy
    VerifyingAlternative {
        /// Lock on the alternative
        lock: LockHandle,
        /// The alternative
        space_id: SpaceId,
    },
    /// Writing the assignment for a locked, verified-free space
    Assigning {
        /// Lock on the chosen space
        lock: LockHandle,
        /// Chosen space
        space_id: SpaceId,
        /// Lot of the chosen space
        lot_id: LotId,
        /// Which write is in progress
        step: AssignStep,
    },
    /// Booking active on `space_id`, space occupied
    Committed {
        /// Assigned space
        space_id: SpaceId,
        /// Lot of the assigned space
        lot_id: LotId,
    },
    /// Terminal failure
    Failed {
        /// Why
        error: CheckInError,
    },
}

impl CheckInPhase {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::LockingOriginal => "locking_original",
            Self::VerifyingOriginal { .. } => "verifying_original",
            Self::SearchingAlternative => "searching_alternative",
            Self::VerifyingAlternative { .. } => "verifying_alternative",
            Self::Assigning { .. } => "assigning",
            Self::Committed { .. } => "committed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the workflow is over
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::Failed { .. })
    }

    /// Whether the booking or space writes are under way. A workflow in
    /// this phase is left to finish even when shutdown cancels the rest.
    #[must_use]
    pub const fn is_writing(&self) -> bool {
        matches!(self, Self::Assigning { .. })
    }

    /// Lock held in this phase, if any
    #[must_use]
    pub const fn held_lock(&self) -> Option<&LockHandle> {
        match self {
            Self::VerifyingOriginal { lock }
            | Self::VerifyingAlternative { lock, .. }
            | Self::Assigning { lock, .. } => Some(lock),
            _ => None,
        }
    }
}

/// State of one check-in workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInState {
    /// The request being processed
    pub request: CheckInRequest,
    /// The booking, once loaded
    pub booking: Option<Booking>,
    /// Current phase
    pub phase: CheckInPhase,
    /// Whether the search for an alternative was entered
    pub searched_alternative: bool,
}

impl CheckInState {
    /// Fresh state for an admitted request
    #[must_use]
    pub const fn new(request: CheckInRequest) -> Self {
        Self {
            request,
            booking: None,
            phase: CheckInPhase::Admitted,
            searched_alternative: false,
        }
    }

    /// Final result, once the phase is terminal
    #[must_use]
    pub fn outcome(&self) -> Option<CheckInOutcome> {
        match &self.phase {
            CheckInPhase::Committed { space_id, lot_id } => Some(CheckInOutcome::Committed {
                space_id: *space_id,
                lot_id: *lot_id,
                alternative: self.searched_alternative,
            }),
            CheckInPhase::Failed { error } => Some(CheckInOutcome::Failed(error.clone())),
            _ => None,
        }
    }
}

/// Terminal result of a check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// Space assigned and occupied
    Committed {
        /// Assigned space
        space_id: SpaceId,
        /// Lot of the assigned space
        lot_id: LotId,
        /// Whether it is an alternative to the booked space
        alternative: bool,
    },
    /// Workflow failed
    Failed(CheckInError),
}

impl CheckInOutcome {
    /// Label for metrics: `committed` or the failure kind
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::Failed(error) => error.kind(),
        }
    }

    /// Assigned space, if committed
    #[must_use]
    pub const fn space_id(&self) -> Option<SpaceId> {
        match self {
            Self::Committed { space_id, .. } => Some(*space_id),
            Self::Failed(_) => None,
        }
    }

    /// Failure, if any
    #[must_use]
    pub const fn error(&self) -> Option<&CheckInError> {
        match self {
            Self::Committed { .. } => None,
            Self::Failed(error) => Some(error),
        }
    }
}
