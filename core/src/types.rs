//! Domain identifiers and records.
//!
//! Bookings, spaces and lots live in the reservation store; the check-in
//! workflow only references them. The one record owned by the workflow is
//! [`CheckInRequest`], which exists from enqueue until the request reaches a
//! terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// A single physical parking space
    SpaceId
);
uuid_id!(
    /// A parking lot (a set of spaces sharing a location and rate)
    LotId
);
uuid_id!(
    /// A booking (reservation) reference
    BookingId
);
uuid_id!(
    /// The user that owns a booking
    RequesterId
);

/// Booking lifecycle state as stored in the reservation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    /// Created, not yet checked in
    Pending,
    /// Checked in and holding a space
    Active,
    /// Legacy checked-in marker; only excluded from candidate searches
    CheckedIn,
    /// Checked out
    Completed,
    /// Cancelled by the requester
    Cancelled,
    /// Expired by the scheduler
    Expired,
}

impl BookingStatus {
    /// Convert to the stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::CheckedIn => "checked-in",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "checked-in" => Some(Self::CheckedIn),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether a booking in this state occupies its space
    #[must_use]
    pub const fn holds_space(&self) -> bool {
        matches!(self, Self::Active | Self::CheckedIn)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking as seen by the check-in workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking reference
    pub id: BookingId,
    /// Owner of the booking
    pub requester_id: RequesterId,
    /// Lot the booking was made for
    pub lot_id: LotId,
    /// Space currently assigned to the booking
    pub space_id: SpaceId,
    /// Lifecycle state
    pub status: BookingStatus,
    /// Total cost, carried through untouched
    pub total_cost: f64,
    /// When the booking was checked in, if it has been
    pub checkin_time: Option<DateTime<Utc>>,
}

/// A parking space and its occupancy flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Space identifier
    pub id: SpaceId,
    /// Lot that contains the space
    pub lot_id: LotId,
    /// Human-readable label (space number)
    pub label: String,
    /// Floor the space is on
    pub floor: String,
    /// Whether a vehicle currently occupies the space
    pub occupied: bool,
}

/// Human-readable location of a space, used for notification text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDescription {
    /// Lot that contains the space
    pub lot_id: LotId,
    /// Lot name (shown as the zone)
    pub zone: String,
    /// Space number
    pub label: String,
    /// Floor
    pub floor: String,
}

/// A queued check-in request: `{requester, booking reference}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRequest {
    /// Who is checking in
    pub requester_id: RequesterId,
    /// Which booking they are checking in to
    pub booking_id: BookingId,
}

/// Occupancy broadcast sent whenever a space flips state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingEvent {
    /// Lot containing the space
    pub lot_id: LotId,
    /// The space that changed
    pub space_id: SpaceId,
    /// New occupancy
    pub is_occupied: bool,
    /// Whether the booking that caused the change is paid
    pub is_paid: bool,
    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}
