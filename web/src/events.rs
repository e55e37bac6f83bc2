//! Fan-out of notifications and parking events to websocket clients.
//!
//! [`EventHub`] is the process's [`Notifier`]: the check-in workflow and
//! check-out publish into it, and every connected websocket subscribes.
//! A slow client that falls more than the channel capacity behind skips the
//! missed events rather than blocking publishers.

use serde::{Deserialize, Serialize};
use smart_parking_core::error::NotifyError;
use smart_parking_core::notification::{Notification, Notifier, NotifyFuture};
use smart_parking_core::types::ParkingEvent;
use tokio::sync::broadcast;

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Message pushed to websocket clients.
///
/// Serialized as `{ "type": "notification" | "parking_update", "payload": .. }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WsEvent {
    /// A user notification
    Notification(Notification),
    /// A space changed occupancy
    ParkingUpdate(ParkingEvent),
}

impl WsEvent {
    /// Wire name of the event type
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::ParkingUpdate(_) => "parking_update",
        }
    }
}

/// Broadcast hub implementing [`Notifier`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<WsEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    /// Create a hub buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    /// Connected subscribers
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: WsEvent) {
        let kind = event.kind();
        // No subscribers is not a delivery failure: nobody is watching.
        match self.sender.send(event) {
            Ok(receivers) => {
                metrics::counter!("ws.events.published", "type" => kind).increment(1);
                tracing::debug!(kind, receivers, "Event broadcast");
            },
            Err(_) => tracing::trace!(kind, "Event dropped, no subscribers"),
        }
    }
}

impl Notifier for EventHub {
    fn notify(&self, notification: Notification) -> NotifyFuture<'_> {
        self.publish(WsEvent::Notification(notification));
        Box::pin(async { Ok::<(), NotifyError>(()) })
    }

    fn publish_parking_event(&self, event: ParkingEvent) -> NotifyFuture<'_> {
        self.publish(WsEvent::ParkingUpdate(event));
        Box::pin(async { Ok::<(), NotifyError>(()) })
    }
}
