//! # Smart Parking Runtime
//!
//! Runtime for the parking-space check-in allocator.
//!
//! Requests enter through the [`IngressQueue`](queue::IngressQueue), pass the
//! [`AdmissionGate`](gate::AdmissionGate), and are driven through the
//! [`CheckInReducer`](checkin::CheckInReducer) by a [`Store`] until they
//! commit a space or fail.
//!
//! ## Core Components
//!
//! - **Store**: Runs a reducer and its effects to completion
//! - **Oracle**: Occupancy and booking reads/writes with a bounded timeout
//! - **Spot locks**: One distributed lock per space
//! - **Finder**: Claims the first lockable unreserved space of a lot
//! - **Orchestrator**: Admission, workflow, outcome metrics; spawns the consumer
//! - **Check-out**: Completes a booking and frees its space
//!
//! ## Example
//!
//! ```ignore
//! use smart_parking_runtime::{CheckInConfig, CheckInEnvironment, CheckInOrchestrator, IngressQueue};
//!
//! let config = CheckInConfig::default();
//! let env = CheckInEnvironment::new(store, mutex, notifier, clock.clone(), &config);
//! let orchestrator = CheckInOrchestrator::new(env, config.clone());
//! let (ingress, receiver) = IngressQueue::bounded(config.queue_capacity, clock);
//! let consumer = orchestrator.spawn(receiver);
//!
//! ingress.try_enqueue(request)?;
//! ```

/// Check-in workflow state machine
pub mod checkin;

/// Check-out of an active booking
pub mod checkout;

/// Tunables for admission, locking and store access
pub mod config;

/// Alternative spot finder
pub mod finder;

/// Admission gate bounding concurrent workflows
pub mod gate;

/// Prometheus metrics for observability
pub mod metrics;

/// Spot availability oracle
pub mod oracle;

/// Admission, workflow execution and the queue consumer
pub mod orchestrator;

/// Bounded ingress queue
pub mod queue;

/// Per-space distributed locks
pub mod spot_lock;

/// Store module - runs a reducer and its effects to completion
pub mod store {
    use futures::future::join_all;
    use smart_parking_core::effect::Effect;
    use smart_parking_core::reducer::Reducer;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;

    /// Holds one piece of state and drives it with a reducer.
    ///
    /// [`send`](Store::send) reduces the action, executes the returned
    /// effects, and feeds every action they produce back into the reducer
    /// until nothing is left. The state is owned by a single task, so no
    /// locking is involved.
    pub struct Store<R: Reducer> {
        state: R::State,
        reducer: R,
        environment: R::Environment,
    }

    impl<R> Store<R>
    where
        R: Reducer,
        R::Action: Send + 'static,
    {
        /// Create a store over `state`.
        pub const fn new(state: R::State, reducer: R, environment: R::Environment) -> Self {
            Self {
                state,
                reducer,
                environment,
            }
        }

        /// Reduce `action` and everything its effects feed back.
        ///
        /// Returns the number of actions reduced.
        pub async fn send(&mut self, action: R::Action) -> usize {
            self.send_while(action, |_| true).await
        }

        /// Like [`send`](Self::send), but stops before reducing the next
        /// action once `proceed` returns `false` for the current state.
        ///
        /// Effects already running are awaited; their actions are dropped.
        pub async fn send_while<F>(&mut self, action: R::Action, mut proceed: F) -> usize
        where
            F: FnMut(&R::State) -> bool,
        {
            let mut pending = VecDeque::from([action]);
            let mut reduced = 0;

            while let Some(action) = pending.pop_front() {
                if !proceed(&self.state) {
                    tracing::debug!(dropped = pending.len() + 1, "Store stopped early");
                    break;
                }
                reduced += 1;
                let effects = self
                    .reducer
                    .reduce(&mut self.state, action, &self.environment);
                if effects.is_empty() {
                    continue;
                }
                let produced = execute(Effect::Parallel(effects.into_vec())).await;
                pending.extend(produced);
            }

            tracing::trace!(reduced, "Store quiescent");
            reduced
        }

        /// Current state
        pub const fn state(&self) -> &R::State {
            &self.state
        }

        /// Consume the store, returning its state
        pub fn into_state(self) -> R::State {
            self.state
        }
    }

    type Produced<A> = Pin<Box<dyn Future<Output = Vec<A>> + Send>>;

    /// Execute an effect tree, collecting the actions it produces in order.
    fn execute<A: Send + 'static>(effect: Effect<A>) -> Produced<A> {
        Box::pin(async move {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                    Vec::new()
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    fut.await.into_iter().collect()
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    join_all(effects.into_iter().map(execute))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                },
                Effect::Sequential(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "sequential")
                        .increment(1);
                    let mut produced = Vec::new();
                    for effect in effects {
                        produced.extend(execute(effect).await);
                    }
                    produced
                },
            }
        })
    }
}

pub use checkin::{
    CheckInAction, CheckInEnvironment, CheckInOutcome, CheckInPhase, CheckInReducer, CheckInState,
};
pub use checkout::{CheckOutError, CheckOutReceipt, CheckOutService};
pub use config::CheckInConfig;
pub use finder::{AlternativeSpotFinder, FinderError};
pub use gate::{AdmissionGate, AdmissionTicket, GateError};
pub use metrics::{CheckInMetrics, CheckOutMetrics, MetricsError, MetricsServer, SpotLockMetrics};
pub use oracle::SpotAvailabilityOracle;
pub use orchestrator::{CheckInOrchestrator, ConsumerHandle, DrainReport};
pub use queue::{Envelope, IngressError, IngressQueue, IngressReceiver, Receipt};
pub use spot_lock::SpotLocks;
pub use store::Store;
