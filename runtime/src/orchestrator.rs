//! Check-in orchestrator: admission, workflow execution and the queue consumer.
//!
//! One consumer task drains the [`IngressReceiver`] and hands every request
//! to its own task. Those tasks run concurrently, bounded by the
//! [`AdmissionGate`]; a request that cannot get a ticket within the
//! admission timeout fails without touching the lock service or the store.

use crate::checkin::{CheckInAction, CheckInEnvironment, CheckInOutcome, CheckInReducer, CheckInState};
use crate::config::CheckInConfig;
use crate::gate::AdmissionGate;
use crate::metrics::CheckInMetrics;
use crate::queue::{Envelope, IngressReceiver};
use crate::store::Store;
use smart_parking_core::error::CheckInError;
use smart_parking_core::types::CheckInRequest;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Runs check-in workflows.
///
/// Constructed once at startup; clones share the gate.
#[derive(Clone)]
pub struct CheckInOrchestrator {
    gate: AdmissionGate,
    env: CheckInEnvironment,
    config: CheckInConfig,
}

impl CheckInOrchestrator {
    /// Create an orchestrator with a gate sized from `config`.
    #[must_use]
    pub fn new(env: CheckInEnvironment, config: CheckInConfig) -> Self {
        let gate = AdmissionGate::new(config.gate_capacity);
        Self::with_gate(env, config, gate)
    }

    /// Create an orchestrator over an existing gate.
    #[must_use]
    pub const fn with_gate(env: CheckInEnvironment, config: CheckInConfig, gate: AdmissionGate) -> Self {
        Self { gate, env, config }
    }

    /// The admission gate
    #[must_use]
    pub const fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run one check-in to its terminal state.
    ///
    /// The admission ticket is held for the whole workflow and returned
    /// whatever the outcome.
    pub async fn process(&self, request: CheckInRequest) -> CheckInOutcome {
        let (_never, cancel) = watch::channel(false);
        self.process_until(request, &cancel).await
    }

    #[tracing::instrument(
        skip(self, cancel),
        fields(booking = %request.booking_id, requester = %request.requester_id)
    )]
    async fn process_until(
        &self,
        request: CheckInRequest,
        cancel: &watch::Receiver<bool>,
    ) -> CheckInOutcome {
        let started = Instant::now();

        let outcome = match self.gate.enter(self.config.admission_timeout).await {
            Ok(ticket) => {
                let outcome = self.run(request, cancel).await;
                self.gate.exit(ticket);
                outcome
            },
            Err(e) => {
                tracing::warn!(error = %e, "Check-in not admitted");
                CheckInOutcome::Failed(CheckInError::AdmissionTimeout(
                    self.config.admission_timeout,
                ))
            },
        };

        CheckInMetrics::record_outcome(outcome.label(), started.elapsed());
        match &outcome {
            CheckInOutcome::Committed {
                space_id,
                lot_id,
                alternative,
            } => tracing::info!(
                space = %space_id,
                lot = %lot_id,
                alternative,
                "Check-in committed"
            ),
            CheckInOutcome::Failed(error) => tracing::warn!(
                kind = error.kind(),
                error = %error,
                "Check-in failed"
            ),
        }
        outcome
    }

    /// Drive the reducer until the workflow is terminal or `cancel` fires.
    ///
    /// Cancellation takes effect between steps, and never while the
    /// booking and space writes are under way.
    async fn run(&self, request: CheckInRequest, cancel: &watch::Receiver<bool>) -> CheckInOutcome {
        let mut store = Store::new(
            CheckInState::new(request),
            CheckInReducer::new(),
            self.env.clone(),
        );
        store
            .send_while(CheckInAction::Begin, |state| {
                state.phase.is_writing() || !*cancel.borrow()
            })
            .await;

        let state = store.into_state();
        if let Some(outcome) = state.outcome() {
            return outcome;
        }

        let cancelled = *cancel.borrow();
        if cancelled {
            tracing::warn!(phase = state.phase.name(), "Check-in cancelled by shutdown");
        } else {
            tracing::error!(phase = state.phase.name(), "Check-in workflow stalled");
        }
        if let Some(lock) = state.phase.held_lock() {
            self.env.locks.release(lock).await;
        }
        CheckInOutcome::Failed(CheckInError::Store(format!(
            "workflow {} in phase {}",
            if cancelled { "cancelled" } else { "stalled" },
            state.phase.name()
        )))
    }

    /// Spawn the consumer loop over `receiver`.
    ///
    /// The loop runs until the queue is closed and drained, or until
    /// [`ConsumerHandle::shutdown`] is called.
    #[must_use]
    pub fn spawn(&self, receiver: IngressReceiver) -> ConsumerHandle {
        let (shutdown, signal) = watch::channel(false);
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(self.clone().consume(receiver, signal, cancelled));
        ConsumerHandle {
            shutdown,
            cancel,
            grace: self.config.store_timeout * WRITE_STEPS,
            task,
        }
    }

    async fn consume(
        self,
        mut receiver: IngressReceiver,
        mut signal: watch::Receiver<bool>,
        cancel: watch::Receiver<bool>,
    ) -> DrainReport {
        let mut workflows = JoinSet::new();
        let mut report = DrainReport::default();
        let mut closing = false;

        tracing::info!(
            gate_capacity = self.gate.capacity(),
            "Check-in consumer started"
        );

        loop {
            tokio::select! {
                _ = signal.changed(), if !closing => {
                    closing = true;
                    receiver.close();
                    tracing::info!(in_flight = workflows.len(), "Check-in consumer draining");
                },
                envelope = receiver.recv() => match envelope {
                    Some(Envelope { receipt, request }) => {
                        tracing::debug!(request_id = %receipt.request_id, "Check-in dequeued");
                        let orchestrator = self.clone();
                        let cancel = cancel.clone();
                        workflows.spawn(async move { orchestrator.process_until(request, &cancel).await });
                    },
                    None => break,
                },
                Some(joined) = workflows.join_next() => report.record(joined),
            }
        }

        while let Some(joined) = workflows.join_next().await {
            report.record(joined);
        }

        tracing::info!(
            processed = report.processed,
            committed = report.committed,
            failed = report.failed,
            "Check-in consumer stopped"
        );
        report
    }
}

/// Tally of workflows finished by a consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Workflows that reached a terminal state
    pub processed: usize,
    /// Of which committed
    pub committed: usize,
    /// Of which failed
    pub failed: usize,
    /// Workflow tasks that panicked or were cancelled
    pub aborted: usize,
    /// Whether the drain hit the shutdown budget
    pub timed_out: bool,
}

impl DrainReport {
    fn record(&mut self, joined: Result<CheckInOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                self.processed += 1;
                match outcome {
                    CheckInOutcome::Committed { .. } => self.committed += 1,
                    CheckInOutcome::Failed(_) => self.failed += 1,
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Check-in task aborted");
                self.aborted += 1;
            },
        }
    }
}

/// Store calls a committing workflow can still make: booking write,
/// occupancy write, compensation, notification lookup.
const WRITE_STEPS: u32 = 4;

/// Handle to a running consumer loop.
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
    grace: Duration,
    task: JoinHandle<DrainReport>,
}

impl ConsumerHandle {
    /// Stop dequeuing and wait up to `timeout` for buffered and in-flight
    /// workflows to finish.
    ///
    /// Once the budget is spent, workflows are cancelled at their next step
    /// except those already writing the assignment, which get a grace period
    /// of a few store timeouts to finish. Anything left after that is
    /// aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> DrainReport {
        // A consumer that already exited has dropped the receiver
        let _ = self.shutdown.send(true);

        if let Ok(joined) = tokio::time::timeout(timeout, &mut self.task).await {
            return consumer_report(joined);
        }

        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            grace_secs = self.grace.as_secs(),
            "Check-in drain timed out, cancelling workflows that are not writing"
        );
        let _ = self.cancel.send(true);

        let report = match tokio::time::timeout(self.grace, &mut self.task).await {
            Ok(joined) => consumer_report(joined),
            Err(_) => {
                tracing::error!("Check-in workflows outlived the cancellation grace, aborting");
                self.task.abort();
                DrainReport::default()
            },
        };
        DrainReport {
            timed_out: true,
            ..report
        }
    }

    /// Wait for the consumer to stop on its own (queue closed and drained).
    pub async fn join(self) -> DrainReport {
        consumer_report(self.task.await)
    }
}

fn consumer_report(joined: Result<DrainReport, JoinError>) -> DrainReport {
    joined.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Check-in consumer panicked");
        DrainReport::default()
    })
}
