//! # Smart Parking Core
//!
//! Domain types and collaborator traits for the parking-space check-in
//! allocator.
//!
//! A check-in is modelled as a reducer. Given where the check-in stands and
//! the next input (the request, or the outcome of a store or lock call), it
//! updates that state and hands back [`Effect`](effect::Effect)s naming the
//! next I/O. The runtime awaits those effects and feeds their results back
//! until the check-in commits or fails.
//!
//! ## Collaborators
//!
//! - [`ReservationStore`](store::ReservationStore): bookings and space occupancy
//! - [`DistributedMutex`](lock::DistributedMutex): time-bounded named locks
//! - [`Notifier`](notification::Notifier): fire-and-forget user notifications
//! - [`Clock`](environment::Clock): time source

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Error taxonomy shared by every crate in the workspace
pub mod error;

/// Spot locks
pub mod lock;

/// Notification payloads and the notifier abstraction
pub mod notification;

/// Bookings and spaces
pub mod store;

/// Identifiers and records
pub mod types;

/// The step function every workflow implements.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Advance a workflow by one action.
    ///
    /// `reduce` never performs I/O itself. Anything that touches the store,
    /// the lock service, or the notifier is returned as an [`Effect`] whose
    /// output becomes the next action.
    ///
    /// ```ignore
    /// impl Reducer for CheckInReducer {
    ///     type State = CheckInState;
    ///     type Action = CheckInAction;
    ///     type Environment = CheckInEnvironment;
    ///
    ///     fn reduce(&self, state: &mut CheckInState, action: CheckInAction, env: &CheckInEnvironment)
    ///         -> SmallVec<[Effect<CheckInAction>; 4]>
    ///     {
    ///         match action {
    ///             CheckInAction::Begin => smallvec![load_booking(env, state.request.booking_id)],
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// Per-workflow state
        type State;

        /// Inputs: the initial request plus I/O outcomes
        type Action;

        /// Injected collaborators
        type Environment;

        /// Apply `action` to `state` and describe the follow-up work.
        ///
        /// A step rarely needs more than a couple of effects, hence the
        /// inline capacity of four.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Deferred work returned by a reducer.
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;

    /// Work the runtime performs on a reducer's behalf.
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Start every effect at once
        Parallel(Vec<Effect<Action>>),

        /// Run each effect after the previous one finishes
        Sequential(Vec<Effect<Action>>),

        /// Await a future; a `Some` output is the next action
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action: fmt::Debug> fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::None => f.write_str("Effect::None"),
                Self::Parallel(group) => f.debug_tuple("Effect::Parallel").field(group).finish(),
                Self::Sequential(group) => {
                    f.debug_tuple("Effect::Sequential").field(group).finish()
                },
                Self::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Group effects to run concurrently.
        #[must_use]
        pub const fn merge(group: Vec<Self>) -> Self {
            Self::Parallel(group)
        }

        /// Group effects to run in order.
        #[must_use]
        pub const fn chain(group: Vec<Self>) -> Self {
            Self::Sequential(group)
        }

        /// Box `fut` as an effect.
        #[must_use]
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(fut))
        }

        /// Whether this effect does no work.
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Self::None)
        }
    }
}

/// Ambient collaborators.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of `accepted_at` and `last_updated` timestamps.
    pub trait Clock: Send + Sync {
        /// Current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// [`Utc::now`]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
