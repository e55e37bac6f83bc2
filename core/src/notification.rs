//! User-facing notifications.
//!
//! Delivery is fire-and-forget: the workflow logs a failed delivery and
//! carries on.

use crate::error::NotifyError;
use crate::types::{BookingId, LotId, ParkingEvent, RequesterId, SpaceDescription, SpaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by notifier operations.
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The booked space is taken; an alternative is being searched
    OccupiedElsewhereSearching,
    /// An alternative space was claimed
    AlternativeFound,
    /// No alternative could be claimed
    NoAlternativeAvailable,
    /// A space is now occupied by this check-in
    OccupancyChanged,
    /// A space was freed by check-out
    SpaceAvailable,
}

impl NotificationKind {
    /// Stable wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OccupiedElsewhereSearching => "occupied_elsewhere_searching",
            Self::AlternativeFound => "alternative_found",
            Self::NoAlternativeAvailable => "no_alternative_available",
            Self::OccupancyChanged => "occupancy_changed",
            Self::SpaceAvailable => "space_available",
        }
    }

    /// Render the message shown to the user.
    ///
    /// `place` is the space's description when it could be loaded; otherwise
    /// the raw space id stands in for it.
    #[must_use]
    pub fn render(&self, space_id: SpaceId, place: Option<&SpaceDescription>) -> String {
        let place = place.map_or_else(
            || space_id.to_string(),
            |d| format!("{} Floor {} Zone {}", d.label, d.floor, d.zone),
        );
        match self {
            Self::OccupiedElsewhereSearching => {
                format!("Parking Space {place} is occupied!, Finding alternative spot")
            },
            Self::AlternativeFound => {
                format!("Alternative Space {place} is available, changing your parking spot")
            },
            Self::NoAlternativeAvailable => {
                format!("Alternative Space {place} is unavailable or occupied!")
            },
            Self::OccupancyChanged => format!("Parking Space {place} is occupied"),
            Self::SpaceAvailable => format!("Parking Space {place} is available now!"),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification addressed to the requester (and anyone watching the lot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What happened
    pub kind: NotificationKind,
    /// Human-readable text
    pub message: String,
    /// Affected space
    pub space_id: SpaceId,
    /// Lot of the affected space, when known
    pub lot_id: Option<LotId>,
    /// Booking that triggered the notification
    pub booking_id: Option<BookingId>,
    /// Requester that triggered the notification
    pub requester_id: Option<RequesterId>,
    /// When it was produced
    pub created_at: DateTime<Utc>,
}

/// Outbound channel for notifications and occupancy broadcasts.
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if delivery fails.
    fn notify(&self, notification: Notification) -> NotifyFuture<'_>;

    /// Broadcast an occupancy change.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if delivery fails.
    fn publish_parking_event(&self, event: ParkingEvent) -> NotifyFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_a12() -> SpaceDescription {
        SpaceDescription {
            lot_id: LotId::new(),
            zone: "North".into(),
            label: "A-12".into(),
            floor: "2".into(),
        }
    }

    #[test]
    fn renders_described_space() {
        let msg = NotificationKind::OccupiedElsewhereSearching
            .render(SpaceId::new(), Some(&north_a12()));
        assert_eq!(
            msg,
            "Parking Space A-12 Floor 2 Zone North is occupied!, Finding alternative spot"
        );

        let msg = NotificationKind::AlternativeFound.render(SpaceId::new(), Some(&north_a12()));
        assert_eq!(
            msg,
            "Alternative Space A-12 Floor 2 Zone North is available, changing your parking spot"
        );
    }

    #[test]
    fn falls_back_to_space_id() {
        let space = SpaceId::new();
        let msg = NotificationKind::OccupancyChanged.render(space, None);
        assert_eq!(msg, format!("Parking Space {space} is occupied"));
    }

    #[test]
    fn kind_wire_names_match_serde() {
        let json = serde_json::to_string(&NotificationKind::NoAlternativeAvailable)
            .unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", NotificationKind::NoAlternativeAvailable));
    }
}
