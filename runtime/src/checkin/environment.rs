//! Collaborators of the check-in reducer.

use crate::config::CheckInConfig;
use crate::finder::AlternativeSpotFinder;
use crate::oracle::SpotAvailabilityOracle;
use crate::spot_lock::SpotLocks;
use smart_parking_core::environment::Clock;
use smart_parking_core::lock::DistributedMutex;
use smart_parking_core::notification::Notifier;
use smart_parking_core::store::ReservationStore;
use std::sync::Arc;

/// Everything the check-in effects talk to.
///
/// Cheap to clone; effects capture clones of the parts they need.
#[derive(Clone)]
pub struct CheckInEnvironment {
    /// Occupancy and booking accessor
    pub oracle: SpotAvailabilityOracle,
    /// Spot locks
    pub locks: SpotLocks,
    /// Alternative search
    pub finder: AlternativeSpotFinder,
    /// Notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Time source for notification timestamps
    pub clock: Arc<dyn Clock>,
}

impl CheckInEnvironment {
    /// Wire the environment from raw collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReservationStore>,
        mutex: Arc<dyn DistributedMutex>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &CheckInConfig,
    ) -> Self {
        let oracle = SpotAvailabilityOracle::new(store, config.store_timeout);
        let locks = SpotLocks::new(mutex, config.lock_ttl, config.store_timeout);
        let finder = AlternativeSpotFinder::new(oracle.clone(), locks.clone());
        Self {
            oracle,
            locks,
            finder,
            notifier,
            clock,
        }
    }
}
