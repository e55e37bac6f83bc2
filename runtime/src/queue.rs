//! Ingress queue between the HTTP layer and the orchestrator.
//!
//! Enqueueing returns a [`Receipt`] as soon as the request is buffered; the
//! outcome is only observable through notifications or the booking's
//! persisted state. A full queue never drops a request silently: callers
//! either wait ([`IngressQueue::enqueue`]) or get
//! [`IngressError::QueueFull`] back ([`IngressQueue::try_enqueue`]).

use crate::metrics::CheckInMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smart_parking_core::environment::Clock;
use smart_parking_core::types::CheckInRequest;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors enqueueing a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngressError {
    /// Every slot is taken
    #[error("Check-in queue is full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity
        capacity: usize,
    },

    /// The consumer has stopped
    #[error("Check-in queue is closed")]
    Closed,
}

/// Acknowledgement handed back to the caller at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Identifier for correlating logs with this request
    pub request_id: Uuid,
    /// When the request was buffered
    pub accepted_at: DateTime<Utc>,
}

/// A buffered request and its receipt.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Receipt returned to the caller
    pub receipt: Receipt,
    /// The request itself
    pub request: CheckInRequest,
}

/// Producer side of the ingress queue. Cheap to clone.
#[derive(Clone)]
pub struct IngressQueue {
    sender: mpsc::Sender<Envelope>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

/// Consumer side of the ingress queue.
#[derive(Debug)]
pub struct IngressReceiver {
    receiver: mpsc::Receiver<Envelope>,
}

impl IngressQueue {
    /// Create a queue holding at most `capacity` requests.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn bounded(capacity: usize, clock: Arc<dyn Clock>) -> (Self, IngressReceiver) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                capacity,
                clock,
            },
            IngressReceiver { receiver },
        )
    }

    fn seal(&self, request: CheckInRequest) -> Envelope {
        Envelope {
            receipt: Receipt {
                request_id: Uuid::new_v4(),
                accepted_at: self.clock.now(),
            },
            request,
        }
    }

    /// Buffer a request, waiting for a free slot if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::Closed`] if the consumer has stopped.
    pub async fn enqueue(&self, request: CheckInRequest) -> Result<Receipt, IngressError> {
        let envelope = self.seal(request);
        let receipt = envelope.receipt;
        self.sender.send(envelope).await.map_err(|_| {
            CheckInMetrics::record_rejected();
            IngressError::Closed
        })?;
        self.accepted(receipt, request);
        Ok(receipt)
    }

    /// Buffer a request without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::QueueFull`] if every slot is taken, or
    /// [`IngressError::Closed`] if the consumer has stopped.
    pub fn try_enqueue(&self, request: CheckInRequest) -> Result<Receipt, IngressError> {
        let envelope = self.seal(request);
        let receipt = envelope.receipt;
        self.sender.try_send(envelope).map_err(|e| {
            CheckInMetrics::record_rejected();
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(
                        booking = %request.booking_id,
                        capacity = self.capacity,
                        "Check-in queue full, rejecting request"
                    );
                    IngressError::QueueFull {
                        capacity: self.capacity,
                    }
                },
                mpsc::error::TrySendError::Closed(_) => IngressError::Closed,
            }
        })?;
        self.accepted(receipt, request);
        Ok(receipt)
    }

    fn accepted(&self, receipt: Receipt, request: CheckInRequest) {
        let depth = self.depth();
        CheckInMetrics::record_enqueued(depth);
        tracing::debug!(
            request_id = %receipt.request_id,
            booking = %request.booking_id,
            depth,
            "Check-in request enqueued"
        );
    }

    /// Requests currently buffered
    #[must_use]
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    /// Maximum number of buffered requests
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the consumer has stopped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl IngressReceiver {
    /// Next buffered request; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Stop accepting requests. Already buffered ones can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
