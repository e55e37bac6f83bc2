//! Admission gate: a fixed budget of concurrently running check-ins.
//!
//! The budget is independent of the ingress queue depth. A workflow holds
//! one [`AdmissionTicket`] from before its first lock or store call until it
//! reaches a terminal state; dropping the ticket returns the slot.

use crate::metrics::CheckInMetrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Errors entering the gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No slot freed up within the timeout
    #[error("Admission timed out after {0:?}")]
    AdmissionTimeout(Duration),

    /// The gate was closed
    #[error("Admission gate closed")]
    Closed,
}

#[derive(Debug)]
struct GateState {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

/// Counting gate over a tokio [`Semaphore`].
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    state: Arc<GateState>,
}

/// One slot of the admission budget. Released on drop.
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
    state: Arc<GateState>,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        let in_flight = self.state.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        CheckInMetrics::record_in_flight(in_flight);
    }
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` workflows at once.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(GateState {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait up to `timeout` for a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::AdmissionTimeout`] if every slot stays taken for
    /// the whole timeout, or [`GateError::Closed`] after [`close`](Self::close).
    pub async fn enter(&self, timeout: Duration) -> Result<AdmissionTicket, GateError> {
        let permit = tokio::time::timeout(
            timeout,
            Arc::clone(&self.state.semaphore).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                timeout_ms = timeout.as_millis(),
                capacity = self.state.capacity,
                "Admission gate saturated"
            );
            GateError::AdmissionTimeout(timeout)
        })?
        .map_err(|_| GateError::Closed)?;

        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.high_water.fetch_max(in_flight, Ordering::SeqCst);
        CheckInMetrics::record_in_flight(in_flight);

        Ok(AdmissionTicket {
            _permit: permit,
            state: Arc::clone(&self.state),
        })
    }

    /// Return a ticket to the gate.
    pub fn exit(&self, ticket: AdmissionTicket) {
        drop(ticket);
    }

    /// Refuse new tickets. Held tickets stay valid.
    pub fn close(&self) {
        self.state.semaphore.close();
    }

    /// Free slots
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.semaphore.available_permits()
    }

    /// Tickets currently held
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Most tickets ever held at once
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.state.high_water.load(Ordering::SeqCst)
    }

    /// Configured capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.capacity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_limits_concurrent_tickets() {
        let gate = AdmissionGate::new(2);
        let max_seen = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..6 {
            let gate = gate.clone();
            let max_seen = Arc::clone(&max_seen);
            let current = Arc::clone(&current);
            handles.push(tokio::spawn(async move {
                let ticket = gate.enter(Duration::from_secs(5)).await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                gate.exit(ticket);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.high_water_mark(), 2);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_times_out_when_full() {
        let gate = AdmissionGate::new(1);
        let _held = gate.enter(Duration::from_secs(1)).await.unwrap();

        let result = gate.enter(Duration::from_secs(30)).await;
        assert_eq!(
            result.unwrap_err(),
            GateError::AdmissionTimeout(Duration::from_secs(30))
        );
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_ticket_drop_frees_slot() {
        let gate = AdmissionGate::new(1);
        {
            let _ticket = gate.enter(Duration::from_secs(1)).await.unwrap();
            assert_eq!(gate.available(), 0);
        }
        assert_eq!(gate.available(), 1);
        assert!(gate.enter(Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_gate_rejects() {
        let gate = AdmissionGate::new(1);
        gate.close();
        assert_eq!(
            gate.enter(Duration::from_secs(1)).await.unwrap_err(),
            GateError::Closed
        );
    }
}
