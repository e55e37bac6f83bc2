//! # Smart Parking Testing
//!
//! In-memory stand-ins for the check-in collaborators, plus
//! [`ReducerTest`] for driving a reducer one action at a time.
//!
//! | Double | Stands in for |
//! |---|---|
//! | [`InMemoryReservationStore`] | Postgres bookings and spaces, with failure injection |
//! | [`InMemoryMutex`] | Redis spot locks, TTL measured on the tokio clock |
//! | [`RecordingNotifier`] | the websocket event hub |
//! | [`FixedClock`] | wall time |
//!
//! ```ignore
//! let store = Arc::new(InMemoryReservationStore::new());
//! let lot = store.add_lot("North");
//! let a01 = store.add_space(lot, "A-01", "1");
//! let booking = store.add_booking(RequesterId::new(), lot, a01, BookingStatus::Pending);
//! ```

mod clock;
mod lock;
mod notifier;
mod reducer_test;
mod store;

pub use clock::{FixedClock, test_clock};
pub use lock::InMemoryMutex;
pub use notifier::RecordingNotifier;
pub use reducer_test::{ReducerTest, assertions, collect_actions};
pub use store::{InMemoryReservationStore, StoreOp};
