//! Notifier that records what it was asked to deliver.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use smart_parking_core::error::NotifyError;
use smart_parking_core::notification::{Notification, NotificationKind, Notifier, NotifyFuture};
use smart_parking_core::types::ParkingEvent;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// [`Notifier`] that keeps every notification and parking event.
///
/// With [`set_failing`](Self::set_failing) every delivery returns
/// [`NotifyError::Delivery`] and nothing is recorded.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    events: Mutex<Vec<ParkingEvent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Notifications delivered so far
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// Kinds of the notifications delivered so far, in order
    #[must_use]
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.kind)
            .collect()
    }

    /// Parking events delivered so far
    #[must_use]
    pub fn parking_events(&self) -> Vec<ParkingEvent> {
        self.events.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("notifier offline".into()));
        }
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.check()?;
            self.notifications.lock().unwrap().push(notification);
            Ok(())
        })
    }

    fn publish_parking_event(&self, event: ParkingEvent) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.check()?;
            self.events.lock().unwrap().push(event);
            Ok(())
        })
    }
}
