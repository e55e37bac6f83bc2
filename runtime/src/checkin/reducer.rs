//! Reducer for the check-in workflow.

use crate::checkin::{
    AssignStep, CheckInAction, CheckInEnvironment, CheckInPhase, CheckInState,
};
use crate::finder::FinderError;
use crate::metrics::CheckInMetrics;
use smart_parking_core::effect::Effect;
use smart_parking_core::error::{CheckInError, StoreError};
use smart_parking_core::lock::LockHandle;
use smart_parking_core::notification::{Notification, NotificationKind};
use smart_parking_core::reducer::Reducer;
use smart_parking_core::types::{
    Booking, BookingStatus, CheckInRequest, LotId, ParkingEvent, SpaceId,
};
use smart_parking_core::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<CheckInAction>; 4]>;

/// Drives one check-in from `Admitted` to `Committed` or `Failed`.
///
/// Every lock, store and notifier call is an effect; the reducer itself only
/// decides the next phase. Actions that do not fit the current phase are
/// logged and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInReducer;

impl CheckInReducer {
    /// Create a new check-in reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for CheckInReducer {
    type State = CheckInState;
    type Action = CheckInAction;
    type Environment = CheckInEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per transition reads better than helpers
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        let request = state.request;

        match (&state.phase, action) {
            (CheckInPhase::Admitted, CheckInAction::Begin) => {
                smallvec![load_booking(env, request)]
            },

            (CheckInPhase::Admitted, CheckInAction::BookingLoaded { booking }) => {
                if booking.status != BookingStatus::Pending {
                    tracing::info!(status = %booking.status, "Booking is not awaiting check-in");
                    let status = booking.status;
                    state.booking = Some(booking);
                    fail(state, CheckInError::BookingNotPending(status));
                    return SmallVec::new();
                }
                let space_id = booking.space_id;
                state.booking = Some(booking);
                transition(state, CheckInPhase::LockingOriginal);
                smallvec![lock_original(env, space_id)]
            },

            (CheckInPhase::Admitted, CheckInAction::BookingMissing) => {
                fail(state, CheckInError::BookingNotFound);
                SmallVec::new()
            },

            (CheckInPhase::Admitted, CheckInAction::BookingLoadFailed { error }) => {
                fail(state, CheckInError::Store(error));
                SmallVec::new()
            },

            (CheckInPhase::LockingOriginal, CheckInAction::OriginalLockAcquired { lock }) => {
                let Some(space_id) = state.booking.as_ref().map(|b| b.space_id) else {
                    return missing_booking(state, env);
                };
                transition(state, CheckInPhase::VerifyingOriginal { lock });
                smallvec![verify(env, space_id, false)]
            },

            (CheckInPhase::LockingOriginal, CheckInAction::OriginalLockUnavailable { reason }) => {
                let Some(booking) = state.booking.clone() else {
                    return missing_booking(state, env);
                };
                tracing::info!(
                    space = %booking.space_id,
                    reason = %reason,
                    "Booked space is being processed elsewhere, searching alternative"
                );
                start_search(state, env, &booking, None)
            },

            (CheckInPhase::VerifyingOriginal { lock }, CheckInAction::OriginalVerified { occupied }) => {
                let lock = lock.clone();
                let Some(booking) = state.booking.clone() else {
                    return missing_booking(state, env);
                };
                if occupied {
                    tracing::info!(
                        space = %booking.space_id,
                        "Booked space occupied despite lock, searching alternative"
                    );
                    start_search(state, env, &booking, Some(lock))
                } else {
                    transition(
                        state,
                        CheckInPhase::Assigning {
                            lock,
                            space_id: booking.space_id,
                            lot_id: booking.lot_id,
                            step: AssignStep::UpdatingBooking,
                        },
                    );
                    smallvec![assign(env, request, booking.lot_id, booking.space_id)]
                }
            },

            (CheckInPhase::VerifyingOriginal { lock }, CheckInAction::OriginalVerifyFailed { error }) => {
                let lock = lock.clone();
                let Some(booking) = state.booking.clone() else {
                    return missing_booking(state, env);
                };
                tracing::warn!(
                    space = %booking.space_id,
                    error = %error,
                    "Could not verify booked space, searching alternative"
                );
                start_search(state, env, &booking, Some(lock))
            },

            (CheckInPhase::SearchingAlternative, CheckInAction::AlternativeLocked { lock, space_id }) => {
                transition(state, CheckInPhase::VerifyingAlternative { lock, space_id });
                smallvec![verify(env, space_id, true)]
            },

            (CheckInPhase::SearchingAlternative, CheckInAction::AlternativeNotFound { error }) => {
                let Some(booking) = state.booking.clone() else {
                    return missing_booking(state, env);
                };
                if let Some(error) = error {
                    tracing::warn!(lot = %booking.lot_id, error = %error, "Alternative search failed");
                }
                fail(state, CheckInError::NoAvailableSpot);
                smallvec![notify(
                    env,
                    NotificationKind::NoAlternativeAvailable,
                    booking.space_id,
                    Some(booking.lot_id),
                    request,
                )]
            },

            (
                CheckInPhase::VerifyingAlternative { lock, space_id },
                CheckInAction::AlternativeVerified { occupied: false },
            ) => {
                let (lock, space_id) = (lock.clone(), *space_id);
                let Some(lot_id) = state.booking.as_ref().map(|b| b.lot_id) else {
                    return missing_booking(state, env);
                };
                transition(
                    state,
                    CheckInPhase::Assigning {
                        lock,
                        space_id,
                        lot_id,
                        step: AssignStep::UpdatingBooking,
                    },
                );
                smallvec![Effect::chain(vec![
                    notify(env, NotificationKind::AlternativeFound, space_id, Some(lot_id), request),
                    assign(env, request, lot_id, space_id),
                ])]
            },

            (
                CheckInPhase::VerifyingAlternative { lock, space_id },
                action @ (CheckInAction::AlternativeVerified { occupied: true }
                | CheckInAction::AlternativeVerifyFailed { .. }),
            ) => {
                let (lock, space_id) = (lock.clone(), *space_id);
                let lot_id = state.booking.as_ref().map(|b| b.lot_id);
                if let CheckInAction::AlternativeVerifyFailed { error } = &action {
                    tracing::warn!(space = %space_id, error = %error, "Could not verify alternative");
                } else {
                    tracing::info!(space = %space_id, "Alternative occupied on re-verification");
                }
                fail(state, CheckInError::NoAvailableSpot);
                smallvec![Effect::chain(vec![
                    release(env, lock),
                    notify(env, NotificationKind::NoAlternativeAvailable, space_id, lot_id, request),
                ])]
            },

            (
                CheckInPhase::Assigning {
                    lock,
                    space_id,
                    lot_id,
                    step: AssignStep::UpdatingBooking,
                },
                CheckInAction::BookingAssigned,
            ) => {
                let (lock, space_id, lot_id) = (lock.clone(), *space_id, *lot_id);
                transition(
                    state,
                    CheckInPhase::Assigning {
                        lock,
                        space_id,
                        lot_id,
                        step: AssignStep::MarkingOccupied,
                    },
                );
                smallvec![mark_occupied(env, space_id)]
            },

            (
                CheckInPhase::Assigning {
                    lock,
                    step: AssignStep::UpdatingBooking,
                    ..
                },
                CheckInAction::BookingAssignFailed { error },
            ) => {
                let lock = lock.clone();
                fail(state, CheckInError::BookingUpdateError(error));
                smallvec![release(env, lock)]
            },

            (
                CheckInPhase::Assigning {
                    lock,
                    space_id,
                    lot_id,
                    step: AssignStep::MarkingOccupied,
                },
                CheckInAction::SpaceMarkedOccupied,
            ) => {
                let (lock, space_id, lot_id) = (lock.clone(), *space_id, *lot_id);
                transition(state, CheckInPhase::Committed { space_id, lot_id });
                smallvec![Effect::chain(vec![
                    publish_occupied(env, lot_id, space_id),
                    notify(env, NotificationKind::OccupancyChanged, space_id, Some(lot_id), request),
                    release(env, lock),
                ])]
            },

            (
                CheckInPhase::Assigning {
                    lock,
                    space_id,
                    lot_id,
                    step: AssignStep::MarkingOccupied,
                },
                CheckInAction::SpaceMarkFailed { error },
            ) => {
                let (lock, space_id, lot_id) = (lock.clone(), *space_id, *lot_id);
                let Some(prior) = state.booking.clone() else {
                    return missing_booking(state, env);
                };
                tracing::warn!(
                    space = %space_id,
                    error = %error,
                    "Failed to mark space occupied, reverting booking"
                );
                transition(
                    state,
                    CheckInPhase::Assigning {
                        lock,
                        space_id,
                        lot_id,
                        step: AssignStep::Compensating { cause: error },
                    },
                );
                smallvec![compensate(env, prior)]
            },

            (
                CheckInPhase::Assigning {
                    lock,
                    step: AssignStep::Compensating { cause },
                    ..
                },
                CheckInAction::CompensationFinished { reverted },
            ) => {
                let (lock, cause) = (lock.clone(), cause.clone());
                if !reverted {
                    tracing::error!(
                        booking = %request.booking_id,
                        "Booking revert failed; booking may stay active without an occupied space"
                    );
                }
                fail(state, CheckInError::SpaceUpdateError(cause));
                smallvec![release(env, lock)]
            },

            (phase, action) => {
                tracing::warn!(
                    phase = phase.name(),
                    action = ?action,
                    "Ignoring action not valid in current phase"
                );
                SmallVec::new()
            },
        }
    }
}

fn transition(state: &mut CheckInState, next: CheckInPhase) {
    tracing::debug!(
        booking = %state.request.booking_id,
        from = state.phase.name(),
        to = next.name(),
        "Check-in transition"
    );
    state.phase = next;
}

fn fail(state: &mut CheckInState, error: CheckInError) {
    transition(state, CheckInPhase::Failed { error });
}

/// A phase past `Admitted` without a loaded booking cannot continue.
fn missing_booking(state: &mut CheckInState, env: &CheckInEnvironment) -> Effects {
    tracing::error!(booking = %state.request.booking_id, phase = state.phase.name(), "No booking loaded");
    let lock = state.phase.held_lock().cloned();
    fail(state, CheckInError::BookingNotFound);
    lock.map_or_else(SmallVec::new, |lock| smallvec![release(env, lock)])
}

/// Enter `SearchingAlternative`, releasing `held` first when given.
///
/// The booked space is left out of the search: it was just rejected.
fn start_search(
    state: &mut CheckInState,
    env: &CheckInEnvironment,
    booking: &Booking,
    held: Option<LockHandle>,
) -> Effects {
    state.searched_alternative = true;
    transition(state, CheckInPhase::SearchingAlternative);

    let mut steps = Vec::with_capacity(3);
    if let Some(lock) = held {
        steps.push(release(env, lock));
    }
    steps.push(notify(
        env,
        NotificationKind::OccupiedElsewhereSearching,
        booking.space_id,
        Some(booking.lot_id),
        state.request,
    ));
    steps.push(search(env, booking.lot_id, booking.space_id));
    smallvec![Effect::chain(steps)]
}

fn load_booking(env: &CheckInEnvironment, request: CheckInRequest) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    Effect::future(async move {
        let action = match oracle.booking(request.booking_id, request.requester_id).await {
            Ok(Some(booking)) => CheckInAction::BookingLoaded { booking },
            Ok(None) | Err(StoreError::NotFound { .. }) => CheckInAction::BookingMissing,
            Err(e) => CheckInAction::BookingLoadFailed {
                error: e.to_string(),
            },
        };
        Some(action)
    })
}

fn lock_original(env: &CheckInEnvironment, space_id: SpaceId) -> Effect<CheckInAction> {
    let locks = env.locks.clone();
    Effect::future(async move {
        let action = match locks.acquire(space_id).await {
            Ok(lock) => CheckInAction::OriginalLockAcquired { lock },
            Err(e) => CheckInAction::OriginalLockUnavailable {
                reason: e.to_string(),
            },
        };
        Some(action)
    })
}

fn verify(env: &CheckInEnvironment, space_id: SpaceId, alternative: bool) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    Effect::future(async move {
        let action = match (alternative, oracle.is_occupied(space_id).await) {
            (false, Ok(occupied)) => CheckInAction::OriginalVerified { occupied },
            (false, Err(e)) => CheckInAction::OriginalVerifyFailed {
                error: e.to_string(),
            },
            (true, Ok(occupied)) => CheckInAction::AlternativeVerified { occupied },
            (true, Err(e)) => CheckInAction::AlternativeVerifyFailed {
                error: e.to_string(),
            },
        };
        Some(action)
    })
}

fn search(env: &CheckInEnvironment, lot_id: LotId, rejected: SpaceId) -> Effect<CheckInAction> {
    let finder = env.finder.clone();
    Effect::future(async move {
        let action = match finder.find_and_lock(lot_id, Some(rejected)).await {
            Ok((lock, space_id)) => CheckInAction::AlternativeLocked { lock, space_id },
            Err(FinderError::NoSpotAvailable(_)) => CheckInAction::AlternativeNotFound { error: None },
            Err(FinderError::Store(e)) => CheckInAction::AlternativeNotFound {
                error: Some(e.to_string()),
            },
        };
        Some(action)
    })
}

fn assign(
    env: &CheckInEnvironment,
    request: CheckInRequest,
    lot_id: LotId,
    space_id: SpaceId,
) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    Effect::future(async move {
        let action = match oracle
            .assign(request.booking_id, request.requester_id, lot_id, space_id)
            .await
        {
            Ok(()) => CheckInAction::BookingAssigned,
            Err(e) => CheckInAction::BookingAssignFailed {
                error: e.to_string(),
            },
        };
        Some(action)
    })
}

fn mark_occupied(env: &CheckInEnvironment, space_id: SpaceId) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    Effect::future(async move {
        let action = match oracle.set_occupied(space_id, true).await {
            Ok(()) => CheckInAction::SpaceMarkedOccupied,
            Err(e) => CheckInAction::SpaceMarkFailed {
                error: e.to_string(),
            },
        };
        Some(action)
    })
}

/// Put the booking back the way it was loaded: `pending`, original lot and space.
fn compensate(env: &CheckInEnvironment, prior: Booking) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    Effect::future(async move {
        let reverted = match oracle.revert(&prior).await {
            Ok(()) => {
                tracing::info!(booking = %prior.id, space = %prior.space_id, "Booking reverted to pending");
                true
            },
            Err(e) => {
                tracing::error!(booking = %prior.id, error = %e, "Booking revert failed");
                false
            },
        };
        CheckInMetrics::record_compensation(reverted);
        Some(CheckInAction::CompensationFinished { reverted })
    })
}

fn release(env: &CheckInEnvironment, lock: LockHandle) -> Effect<CheckInAction> {
    let locks = env.locks.clone();
    Effect::future(async move {
        locks.release(&lock).await;
        None
    })
}

fn notify(
    env: &CheckInEnvironment,
    kind: NotificationKind,
    space_id: SpaceId,
    lot_id: Option<LotId>,
    request: CheckInRequest,
) -> Effect<CheckInAction> {
    let oracle = env.oracle.clone();
    let notifier = env.notifier.clone();
    let clock = env.clock.clone();
    Effect::future(async move {
        let place = oracle
            .describe(space_id)
            .await
            .inspect_err(|e| {
                tracing::debug!(space = %space_id, error = %e, "No description for notification");
            })
            .ok();
        let notification = Notification {
            kind,
            message: kind.render(space_id, place.as_ref()),
            space_id,
            lot_id: place.as_ref().map(|p| p.lot_id).or(lot_id),
            booking_id: Some(request.booking_id),
            requester_id: Some(request.requester_id),
            created_at: clock.now(),
        };
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(kind = %kind, space = %space_id, error = %e, "Notification not delivered");
        }
        None
    })
}

fn publish_occupied(env: &CheckInEnvironment, lot_id: LotId, space_id: SpaceId) -> Effect<CheckInAction> {
    let notifier = env.notifier.clone();
    let event = ParkingEvent {
        lot_id,
        space_id,
        is_occupied: true,
        is_paid: false,
        timestamp: env.clock.now(),
    };
    Effect::future(async move {
        if let Err(e) = notifier.publish_parking_event(event).await {
            tracing::warn!(space = %space_id, error = %e, "Parking event not delivered");
        }
        None
    })
}
