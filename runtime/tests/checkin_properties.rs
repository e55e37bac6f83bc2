//! Safety and liveness properties of the check-in pipeline.
//!
//! Every test runs the real orchestrator against the in-memory store and
//! mutex, so concurrent workflows interleave at each store and lock call.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use futures::future::join_all;
use proptest::prelude::*;
use smart_parking_core::error::CheckInError;
use smart_parking_core::lock::spot_lock_key;
use smart_parking_core::types::{BookingStatus, CheckInRequest, LotId, RequesterId, SpaceId};
use smart_parking_runtime::{CheckInConfig, CheckInEnvironment, CheckInOrchestrator, CheckInOutcome};
use smart_parking_testing::{
    InMemoryMutex, InMemoryReservationStore, RecordingNotifier, StoreOp, test_clock,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Lot {
    store: Arc<InMemoryReservationStore>,
    mutex: Arc<InMemoryMutex>,
    notifier: Arc<RecordingNotifier>,
    lot: LotId,
    spaces: Vec<SpaceId>,
}

impl Lot {
    fn with_spaces(store: InMemoryReservationStore, count: usize) -> Self {
        let store = Arc::new(store);
        let lot = store.add_lot("North");
        let spaces = (0..count)
            .map(|i| store.add_space(lot, &format!("A-{i:02}"), "1"))
            .collect();
        Self {
            store,
            mutex: Arc::new(InMemoryMutex::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            lot,
            spaces,
        }
    }

    fn book(&self, space: SpaceId) -> CheckInRequest {
        let requester_id = RequesterId::new();
        let booking_id = self
            .store
            .add_booking(requester_id, self.lot, space, BookingStatus::Pending);
        CheckInRequest {
            requester_id,
            booking_id,
        }
    }

    fn orchestrator(&self, config: CheckInConfig) -> CheckInOrchestrator {
        let env = CheckInEnvironment::new(
            self.store.clone(),
            self.mutex.clone(),
            self.notifier.clone(),
            Arc::new(test_clock()),
            &config,
        );
        CheckInOrchestrator::new(env, config)
    }

    async fn run_all(&self, orchestrator: &CheckInOrchestrator, requests: &[CheckInRequest]) -> Vec<CheckInOutcome> {
        let runs = requests.iter().map(|request| {
            let orchestrator = orchestrator.clone();
            let request = *request;
            tokio::spawn(async move { orchestrator.process(request).await })
        });
        join_all(runs)
            .await
            .into_iter()
            .map(|joined| joined.expect("workflow task panicked"))
            .collect()
    }

    fn assert_single_holders(&self) {
        for space in &self.spaces {
            let holders = self.store.holders_of(*space);
            assert!(
                holders.len() <= 1,
                "space {space} assigned to {} bookings",
                holders.len()
            );
        }
        assert_eq!(self.store.double_occupancies(), 0);
    }
}

fn committed_spaces(outcomes: &[CheckInOutcome]) -> Vec<SpaceId> {
    outcomes.iter().filter_map(CheckInOutcome::space_id).collect()
}

// ============================================================================
// Mutual exclusion
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn no_space_is_ever_double_assigned(
        free in 1usize..4,
        requests in 2usize..8,
        contested in proptest::bool::ANY,
    ) {
        let lot = Lot::with_spaces(InMemoryReservationStore::new(), free);
        let outcomes = tokio_test::block_on(async {
            let orchestrator = lot.orchestrator(CheckInConfig::default());
            let bookings: Vec<_> = (0..requests)
                .map(|i| {
                    let space = if contested { lot.spaces[0] } else { lot.spaces[i % free] };
                    lot.book(space)
                })
                .collect();
            lot.run_all(&orchestrator, &bookings).await
        });

        let committed = committed_spaces(&outcomes);
        let distinct: HashSet<_> = committed.iter().copied().collect();
        prop_assert_eq!(distinct.len(), committed.len());
        prop_assert!(committed.len() <= free);
        for outcome in &outcomes {
            if let Some(error) = outcome.error() {
                prop_assert_eq!(error, &CheckInError::NoAvailableSpot);
            }
        }
        lot.assert_single_holders();
        prop_assert_eq!(lot.mutex.held_count(), 0);
    }
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn admitted_workflows_never_exceed_gate_capacity() {
    let lot = Lot::with_spaces(
        InMemoryReservationStore::new().with_latency(Duration::from_millis(2)),
        20,
    );
    let orchestrator = lot.orchestrator(CheckInConfig {
        gate_capacity: 3,
        ..CheckInConfig::default()
    });
    let requests: Vec<_> = lot.spaces.iter().map(|space| lot.book(*space)).collect();

    let outcomes = lot.run_all(&orchestrator, &requests).await;

    assert_eq!(committed_spaces(&outcomes).len(), 20);
    assert!(orchestrator.gate().high_water_mark() <= 3);
    assert_eq!(orchestrator.gate().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn saturated_gate_fails_without_touching_locks_or_store() {
    let lot = Lot::with_spaces(InMemoryReservationStore::new(), 1);
    let request = lot.book(lot.spaces[0]);
    let orchestrator = lot.orchestrator(CheckInConfig {
        gate_capacity: 1,
        admission_timeout: Duration::from_millis(50),
        ..CheckInConfig::default()
    });
    let _busy = orchestrator
        .gate()
        .enter(Duration::from_secs(1))
        .await
        .unwrap();

    let outcome = orchestrator.process(request).await;

    assert_eq!(
        outcome,
        CheckInOutcome::Failed(CheckInError::AdmissionTimeout(Duration::from_millis(50)))
    );
    assert_eq!(lot.mutex.acquire_attempts(), 0);
    assert_eq!(lot.store.total_calls(), 0);
    assert!(lot.notifier.notifications().is_empty());
}

// ============================================================================
// Compensation
// ============================================================================

#[tokio::test]
async fn failed_occupancy_write_leaves_booking_retryable() {
    let lot = Lot::with_spaces(InMemoryReservationStore::new(), 1);
    let space = lot.spaces[0];
    let request = lot.book(space);
    let orchestrator = lot.orchestrator(CheckInConfig::default());

    lot.store.fail(StoreOp::SetOccupied, true);
    let first = orchestrator.process(request).await;

    assert!(matches!(
        first,
        CheckInOutcome::Failed(CheckInError::SpaceUpdateError(_))
    ));
    let booking = lot.store.booking(request.booking_id).unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert!(booking.checkin_time.is_none());
    assert!(!lot.store.space(space).unwrap().occupied);
    assert_eq!(lot.mutex.held_count(), 0);

    lot.store.fail(StoreOp::SetOccupied, false);
    let retry = orchestrator.process(request).await;

    assert_eq!(retry.space_id(), Some(space));
    assert_eq!(
        lot.store.booking(request.booking_id).unwrap().status,
        BookingStatus::Active
    );
}

// ============================================================================
// Alternative fallback
// ============================================================================

#[tokio::test]
async fn locked_original_commits_to_the_free_alternative() {
    let lot = Lot::with_spaces(InMemoryReservationStore::new(), 2);
    let (original, alternative) = (lot.spaces[0], lot.spaces[1]);
    let request = lot.book(original);
    let _concurrent = lot.mutex.hold(&spot_lock_key(original), Duration::from_secs(10));

    let outcome = lot
        .orchestrator(CheckInConfig::default())
        .process(request)
        .await;

    assert_eq!(
        outcome,
        CheckInOutcome::Committed {
            space_id: alternative,
            lot_id: lot.lot,
            alternative: true,
        }
    );
    assert!(!lot.store.space(original).unwrap().occupied);
    assert_eq!(lot.store.booking(request.booking_id).unwrap().space_id, alternative);
}

#[tokio::test]
async fn no_alternative_fails_and_notifies() {
    let lot = Lot::with_spaces(InMemoryReservationStore::new(), 1);
    let original = lot.spaces[0];
    let request = lot.book(original);
    let _concurrent = lot.mutex.hold(&spot_lock_key(original), Duration::from_secs(10));

    let outcome = lot
        .orchestrator(CheckInConfig::default())
        .process(request)
        .await;

    assert_eq!(outcome, CheckInOutcome::Failed(CheckInError::NoAvailableSpot));
    let kinds: Vec<_> = lot
        .notifier
        .notifications()
        .into_iter()
        .map(|n| n.kind.as_str())
        .collect();
    assert_eq!(kinds, ["occupied_elsewhere_searching", "no_alternative_available"]);
}

// ============================================================================
// Lock expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn crashed_holder_lock_expires_after_ttl() {
    let lot = Lot::with_spaces(InMemoryReservationStore::new(), 1);
    let space = lot.spaces[0];
    let request = lot.book(space);
    let config = CheckInConfig::default();
    let _crashed = lot.mutex.hold(&spot_lock_key(space), config.lock_ttl);
    let orchestrator = lot.orchestrator(config.clone());

    tokio::time::advance(config.lock_ttl + Duration::from_millis(1)).await;
    let outcome = orchestrator.process(request).await;

    assert_eq!(
        outcome,
        CheckInOutcome::Committed {
            space_id: space,
            lot_id: lot.lot,
            alternative: false,
        }
    );
}
