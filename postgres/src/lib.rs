//! `PostgreSQL` reservation store for smart-parking.
//!
//! Implements [`ReservationStore`](smart_parking_core::store::ReservationStore)
//! with sqlx runtime queries over three tables:
//!
//! - `parking_lots`: lots, whose name doubles as the zone in notifications
//! - `parking_spaces`: spaces and their `is_occupied` flag
//! - `reservations`: bookings and their lifecycle status
//!
//! # Example
//!
//! ```ignore
//! use smart_parking_postgres::PostgresReservationStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresReservationStore::connect("postgres://localhost/smart_parking", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod store;

pub use store::PostgresReservationStore;
