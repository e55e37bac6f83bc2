//! `ReservationStore` over the `parking_lots` / `parking_spaces` /
//! `reservations` tables.

use chrono::{DateTime, Utc};
use smart_parking_core::error::StoreError;
use smart_parking_core::store::{ReservationStore, StoreFuture};
use smart_parking_core::types::{
    Booking, BookingId, BookingStatus, LotId, RequesterId, Space, SpaceDescription, SpaceId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

/// PostgreSQL reservation store.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| db_error("ping", &e))
    }
}

fn db_error(op: &'static str, error: &sqlx::Error) -> StoreError {
    metrics::counter!("store.errors", "op" => op).increment(1);
    tracing::debug!(op, error = %error, "Reservation store query failed");
    StoreError::Database(format!("{op}: {error}"))
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let status: String = row.try_get("status").map_err(|e| db_error("decode_booking", &e))?;
    let status = BookingStatus::parse(&status)
        .ok_or_else(|| StoreError::Database(format!("Invalid booking status: {status}")))?;
    let decode = |e: sqlx::Error| db_error("decode_booking", &e);

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        requester_id: RequesterId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(decode)?),
        lot_id: LotId::from_uuid(row.try_get::<Uuid, _>("parking_lot_id").map_err(decode)?),
        space_id: SpaceId::from_uuid(row.try_get::<Uuid, _>("parking_space_id").map_err(decode)?),
        status,
        total_cost: row.try_get("total_cost").map_err(decode)?,
        checkin_time: row
            .try_get::<Option<DateTime<Utc>>, _>("checkin_time")
            .map_err(decode)?,
    })
}

fn expect_one_row(
    affected: u64,
    entity: &'static str,
    id: impl ToString,
) -> Result<(), StoreError> {
    if affected == 0 {
        Err(StoreError::not_found(entity, id))
    } else {
        Ok(())
    }
}

impl ReservationStore for PostgresReservationStore {
    fn query_unreserved_spaces(&self, lot_id: LotId) -> StoreFuture<'_, Vec<SpaceId>> {
        Box::pin(async move {
            let rows: Vec<(Uuid,)> = sqlx::query_as(
                r"
                SELECT ps.id
                FROM parking_spaces ps
                WHERE ps.parking_lot_id = $1
                  AND NOT ps.is_occupied
                  AND NOT EXISTS (
                      SELECT 1 FROM reservations r
                      WHERE r.parking_space_id = ps.id
                        AND r.status IN ('active', 'checked-in')
                  )
                ORDER BY ps.space_number
                ",
            )
            .bind(lot_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("query_unreserved_spaces", &e))?;

            Ok(rows.into_iter().map(|(id,)| SpaceId::from_uuid(id)).collect())
        })
    }

    fn get_booking(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
    ) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, user_id, parking_lot_id, parking_space_id, status,
                       total_cost, checkin_time
                FROM reservations
                WHERE id = $1 AND user_id = $2
                ",
            )
            .bind(booking_id.as_uuid())
            .bind(requester_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get_booking", &e))?;

            row.as_ref().map(booking_from_row).transpose()
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
            let result = sqlx::query(
                r"
                UPDATE reservations
                SET parking_lot_id = $1,
                    parking_space_id = $2,
                    status = $3,
                    checkin_time = CASE WHEN $3 = 'active' THEN now() ELSE checkin_time END,
                    updated_at = now()
                WHERE id = $4 AND user_id = $5
                ",
            )
            .bind(lot_id.as_uuid())
            .bind(space_id.as_uuid())
            .bind(status.as_str())
            .bind(booking_id.as_uuid())
            .bind(requester_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update_booking_assignment", &e))?;

            expect_one_row(result.rows_affected(), "booking", booking_id)
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
            let result = sqlx::query(
                r"
                UPDATE reservations
                SET status = 'pending',
                    parking_lot_id = $1,
                    parking_space_id = $2,
                    checkin_time = NULL,
                    updated_at = now()
                WHERE id = $3 AND user_id = $4
                ",
            )
            .bind(lot_id.as_uuid())
            .bind(space_id.as_uuid())
            .bind(booking_id.as_uuid())
            .bind(requester_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("revert_booking_assignment", &e))?;

            expect_one_row(result.rows_affected(), "booking", booking_id)
        })
    }

    fn set_booking_status(
        &self,
        booking_id: BookingId,
        requester_id: RequesterId,
        status: BookingStatus,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE reservations
                SET status = $1, updated_at = now()
                WHERE id = $2 AND user_id = $3
                ",
            )
            .bind(status.as_str())
            .bind(booking_id.as_uuid())
            .bind(requester_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("set_booking_status", &e))?;

            expect_one_row(result.rows_affected(), "booking", booking_id)
        })
    }

    fn get_space(&self, space_id: SpaceId) -> StoreFuture<'_, Space> {
        Box::pin(async move {
            let row: Option<(Uuid, Uuid, String, String, bool)> = sqlx::query_as(
                r"
                SELECT id, parking_lot_id, space_number, floor, is_occupied
                FROM parking_spaces
                WHERE id = $1
                ",
            )
            .bind(space_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get_space", &e))?;

            let (id, lot_id, label, floor, occupied) =
                row.ok_or_else(|| StoreError::not_found("space", space_id))?;
            Ok(Space {
                id: SpaceId::from_uuid(id),
                lot_id: LotId::from_uuid(lot_id),
                label,
                floor,
                occupied,
            })
        })
    }

    fn describe_space(&self, space_id: SpaceId) -> StoreFuture<'_, SpaceDescription> {
        Box::pin(async move {
            let row: Option<(Uuid, String, String, String)> = sqlx::query_as(
                r"
                SELECT ps.parking_lot_id, pl.name, ps.space_number, ps.floor
                FROM parking_spaces ps
                JOIN parking_lots pl ON pl.id = ps.parking_lot_id
                WHERE ps.id = $1
                ",
            )
            .bind(space_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("describe_space", &e))?;

            let (lot_id, zone, label, floor) =
                row.ok_or_else(|| StoreError::not_found("space", space_id))?;
            Ok(SpaceDescription {
                lot_id: LotId::from_uuid(lot_id),
                zone,
                label,
                floor,
            })
        })
    }

    fn set_space_occupied(&self, space_id: SpaceId, occupied: bool) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE parking_spaces
                SET is_occupied = $1, last_updated = now()
                WHERE id = $2
                ",
            )
            .bind(occupied)
            .bind(space_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("set_space_occupied", &e))?;

            expect_one_row(result.rows_affected(), "space", space_id)
        })
    }
}
