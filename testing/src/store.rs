//! In-memory reservation store.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use chrono::Utc;
use smart_parking_core::error::StoreError;
use smart_parking_core::store::{ReservationStore, StoreFuture};
use smart_parking_core::types::{
    Booking, BookingId, BookingStatus, LotId, RequesterId, Space, SpaceDescription, SpaceId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Store operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `query_unreserved_spaces`
    QueryUnreserved,
    /// `get_booking`
    GetBooking,
    /// `update_booking_assignment`
    UpdateBooking,
    /// `revert_booking_assignment`
    RevertBooking,
    /// `set_booking_status`
    SetBookingStatus,
    /// `get_space`
    GetSpace,
    /// `describe_space`
    DescribeSpace,
    /// `set_space_occupied`
    SetOccupied,
}

#[derive(Debug, Default)]
struct Tables {
    lots: HashMap<LotId, String>,
    spaces: HashMap<SpaceId, Space>,
    bookings: HashMap<BookingId, Booking>,
}

/// `HashMap`-backed [`ReservationStore`].
///
/// Every call yields to the scheduler first (and optionally sleeps), so
/// concurrent workflows interleave between store steps the way they do
/// against a real database.
///
/// Failures are injected per operation with [`fail`](Self::fail); setting a
/// space occupied when it already is counts as a double occupancy.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<StoreOp>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    latency: Option<Duration>,
    double_occupancies: AtomicUsize,
}

impl InMemoryReservationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a lot named `name`
    pub fn add_lot(&self, name: &str) -> LotId {
        let id = LotId::new();
        self.tables.lock().unwrap().lots.insert(id, name.to_string());
        id
    }

    /// Add a free space to `lot_id`
    pub fn add_space(&self, lot_id: LotId, label: &str, floor: &str) -> SpaceId {
        let id = SpaceId::new();
        self.tables.lock().unwrap().spaces.insert(
            id,
            Space {
                id,
                lot_id,
                label: label.to_string(),
                floor: floor.to_string(),
                occupied: false,
            },
        );
        id
    }

    /// Add a booking for `space_id`
    pub fn add_booking(
        &self,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
        status: BookingStatus,
    ) -> BookingId {
        let id = BookingId::new();
        self.tables.lock().unwrap().bookings.insert(
            id,
            Booking {
                id,
                requester_id,
                lot_id,
                space_id,
                status,
                total_cost: 0.0,
                checkin_time: (status == BookingStatus::Active).then(Utc::now),
            },
        );
        id
    }

    /// Seed a space's occupancy without going through the trait
    pub fn seed_occupied(&self, space_id: SpaceId, occupied: bool) {
        if let Some(space) = self.tables.lock().unwrap().spaces.get_mut(&space_id) {
            space.occupied = occupied;
        }
    }

    /// Overwrite a booking's status without going through the trait
    pub fn seed_status(&self, booking_id: BookingId, status: BookingStatus) {
        if let Some(booking) = self.tables.lock().unwrap().bookings.get_mut(&booking_id) {
            booking.status = status;
        }
    }

    /// Make `op` fail (or stop failing)
    pub fn fail(&self, op: StoreOp, failing: bool) {
        let mut ops = self.failing.lock().unwrap();
        if failing {
            ops.insert(op);
        } else {
            ops.remove(&op);
        }
    }

    /// Snapshot of a booking
    #[must_use]
    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.tables.lock().unwrap().bookings.get(&id).cloned()
    }

    /// Snapshot of a space
    #[must_use]
    pub fn space(&self, id: SpaceId) -> Option<Space> {
        self.tables.lock().unwrap().spaces.get(&id).cloned()
    }

    /// Bookings currently holding `space_id`
    #[must_use]
    pub fn holders_of(&self, space_id: SpaceId) -> Vec<BookingId> {
        self.tables
            .lock()
            .unwrap()
            .bookings
            .values()
            .filter(|b| b.space_id == space_id && b.status.holds_space())
            .map(|b| b.id)
            .collect()
    }

    /// How many times `op` was called
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Total calls across every operation
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Times a space was set occupied while already occupied
    #[must_use]
    pub fn double_occupancies(&self) -> usize {
        self.double_occupancies.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StoreError::Database(format!("injected failure: {op:?}")));
        }
        Ok(())
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn query_unreserved_spaces(&self, lot_id: LotId) -> StoreFuture<'_, Vec<SpaceId>> {
        Box::pin(async move {
            self.enter(StoreOp::QueryUnreserved).await?;
            let tables = self.tables.lock().unwrap();
            let mut spaces: Vec<&Space> = tables
                .spaces
                .values()
                .filter(|s| s.lot_id == lot_id && !s.occupied)
                .filter(|s| {
                    !tables
                        .bookings
                        .values()
                        .any(|b| b.space_id == s.id && b.status.holds_space())
                })
                .collect();
            spaces.sort_by(|a, b| a.label.cmp(&b.label));
            Ok(spaces.into_iter().map(|s| s.id).collect())
        })
    }

    fn get_booking(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
    ) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            self.enter(StoreOp::GetBooking).await?;
            let tables = self.tables.lock().unwrap();
            Ok(tables
                .bookings
                .get(&booking_id)
                .filter(|b| b.requester_id == requester_id)
                .cloned())
        })
    }

    fn update_booking_assignment(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
        status: BookingStatus,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(StoreOp::UpdateBooking).await?;
            let mut tables = self.tables.lock().unwrap();
            let booking = tables
                .bookings
                .get_mut(&booking_id)
                .filter(|b| b.requester_id == requester_id)
                .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
            booking.lot_id = lot_id;
            booking.space_id = space_id;
            booking.status = status;
            if status == BookingStatus::Active {
                booking.checkin_time = Some(Utc::now());
            }
            Ok(())
        })
    }

    fn revert_booking_assignment(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        lot_id: LotId,
        space_id: SpaceId,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(StoreOp::RevertBooking).await?;
            let mut tables = self.tables.lock().unwrap();
            let booking = tables
                .bookings
                .get_mut(&booking_id)
                .filter(|b| b.requester_id == requester_id)
                .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
            booking.lot_id = lot_id;
            booking.space_id = space_id;
            booking.status = BookingStatus::Pending;
            booking.checkin_time = None;
            Ok(())
        })
    }

    fn set_booking_status(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        status: BookingStatus,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(StoreOp::SetBookingStatus).await?;
            let mut tables = self.tables.lock().unwrap();
            let booking = tables
                .bookings
                .get_mut(&booking_id)
                .filter(|b| b.requester_id == requester_id)
                .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
            booking.status = status;
            Ok(())
        })
    }

    fn get_space(&self, space_id: SpaceId) -> StoreFuture<'_, Space> {
        Box::pin(async move {
            self.enter(StoreOp::GetSpace).await?;
            self.tables
                .lock()
                .unwrap()
                .spaces
                .get(&space_id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("space", space_id))
        })
    }

    fn describe_space(&self, space_id: SpaceId) -> StoreFuture<'_, SpaceDescription> {
        Box::pin(async move {
            self.enter(StoreOp::DescribeSpace).await?;
            let tables = self.tables.lock().unwrap();
            let space = tables
                .spaces
                .get(&space_id)
                .ok_or_else(|| StoreError::not_found("space", space_id))?;
            Ok(SpaceDescription {
                lot_id: space.lot_id,
                zone: tables.lots.get(&space.lot_id).cloned().unwrap_or_default(),
                label: space.label.clone(),
                floor: space.floor.clone(),
            })
        })
    }

    fn set_space_occupied(&self, space_id: SpaceId, occupied: bool) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(StoreOp::SetOccupied).await?;
            let mut tables = self.tables.lock().unwrap();
            let space = tables
                .spaces
                .get_mut(&space_id)
                .ok_or_else(|| StoreError::not_found("space", space_id))?;
            if occupied && space.occupied {
                self.double_occupancies.fetch_add(1, Ordering::SeqCst);
            }
            space.occupied = occupied;
            Ok(())
        })
    }
}
