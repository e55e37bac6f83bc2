//! Alternative spot finder.
//!
//! The unreserved-spaces query is only a shortlist: concurrent finders see
//! the same candidates, and the spot lock decides who gets each one.

use crate::oracle::SpotAvailabilityOracle;
use crate::spot_lock::SpotLocks;
use smart_parking_core::error::{LockError, StoreError};
use smart_parking_core::lock::LockHandle;
use smart_parking_core::types::{LotId, SpaceId};
use thiserror::Error;

/// Why no alternative was claimed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinderError {
    /// Every candidate was locked elsewhere (or there were none)
    #[error("No spot available in lot {0}")]
    NoSpotAvailable(LotId),

    /// The candidate query failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Claims the first lockable unreserved space of a lot.
#[derive(Clone)]
pub struct AlternativeSpotFinder {
    oracle: SpotAvailabilityOracle,
    locks: SpotLocks,
}

impl AlternativeSpotFinder {
    /// Create a finder over `oracle`, locking through `locks`.
    #[must_use]
    pub const fn new(oracle: SpotAvailabilityOracle, locks: SpotLocks) -> Self {
        Self { oracle, locks }
    }

    /// Lock the first candidate in `lot_id` that nobody else holds.
    ///
    /// Candidates are tried once each, in enumeration order, never including
    /// `exclude`. A candidate whose lock call fails for any reason is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::NoSpotAvailable`] when every candidate is
    /// exhausted, or [`FinderError::Store`] if the candidate query fails.
    #[tracing::instrument(skip(self), fields(lot = %lot_id))]
    pub async fn find_and_lock(
        &self,
        lot_id: LotId,
        exclude: Option<SpaceId>,
    ) -> Result<(LockHandle, SpaceId), FinderError> {
        let mut candidates = self.oracle.unreserved_spaces(lot_id).await?;
        candidates.retain(|space_id| Some(*space_id) != exclude);
        tracing::debug!(candidates = candidates.len(), "Searching for alternative spot");

        for space_id in candidates {
            match self.locks.acquire(space_id).await {
                Ok(handle) => {
                    tracing::info!(space = %space_id, "Alternative spot locked");
                    return Ok((handle, space_id));
                },
                Err(LockError::LockUnavailable { .. }) => {},
                Err(e) => {
                    tracing::debug!(space = %space_id, error = %e, "Skipping candidate");
                },
            }
        }

        Err(FinderError::NoSpotAvailable(lot_id))
    }
}
