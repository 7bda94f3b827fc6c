use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    Booking, BookingId, BookingLedger, Catalog, Email, Event, EventDetail, EventId,
    LedgerSnapshot, NewEvent, Requester, Result, Slot, SlotDetail, SlotId, SlotInfo, SlotUnit,
    StoreConfig, StoreError,
};

/// SQLSTATE codes that mean "run the transaction again".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Backstop for the one-booking-per-requester rule.
const SLOT_EMAIL_CONSTRAINT: &str = "bookings_slot_email_key";

const BOOKING_COLUMNS: &str = "id, time_slot_id, user_name, user_email, created_at";

/// PostgreSQL-backed slot store.
///
/// A [`SlotUnit`] is a transaction holding `FOR UPDATE` on the slot's row.
/// Every booking write and every delete of the slot goes through that row
/// lock, so occupancy counted inside the transaction is exact.
#[derive(Clone)]
pub struct PostgresSlotStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PostgresSlotStore {
    /// Creates a new PostgreSQL slot store.
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, StoreConfig::default())
    }

    /// Creates a new store with the given configuration.
    pub fn with_config(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        config: StoreConfig,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::with_config(pool, config))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Starts a transaction whose row locks give up after the configured timeout.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        // SET cannot take bind parameters
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = {}",
            self.config.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }

    fn row_to_event(row: &PgRow) -> Result<Event> {
        let capacity: i32 = row.try_get("capacity")?;
        Ok(Event {
            id: EventId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            capacity: u32::try_from(capacity)
                .map_err(|_| StoreError::Corrupt(format!("negative capacity {capacity}")))?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_slot(row: &PgRow) -> Result<Slot> {
        Ok(Slot {
            id: SlotId::from_uuid(row.try_get("id")?),
            event_id: EventId::from_uuid(row.try_get("event_id")?),
            start_time: row.try_get("start_time")?,
        })
    }

    fn row_to_booking(row: &PgRow) -> Result<Booking> {
        let email: String = row.try_get("user_email")?;
        Ok(Booking {
            id: BookingId::from_uuid(row.try_get("id")?),
            slot_id: SlotId::from_uuid(row.try_get("time_slot_id")?),
            requester: Requester {
                name: row.try_get("user_name")?,
                email: Email::parse(&email).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            },
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Maps lock timeouts, serialization failures and duplicate-key races to
/// [`StoreError::Contention`].
fn map_contention(err: sqlx::Error, resource: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        let transient = matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE)
        ) || db_err.constraint() == Some(SLOT_EMAIL_CONSTRAINT);
        if transient {
            return StoreError::Contention(resource());
        }
    }
    StoreError::Database(err)
}

async fn count_and_holder(
    conn: &mut sqlx::PgConnection,
    slot_id: SlotId,
    email: &Email,
) -> Result<LedgerSnapshot> {
    let occupancy: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE time_slot_id = $1")
        .bind(slot_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;

    let held: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM bookings WHERE time_slot_id = $1 AND user_email = $2")
            .bind(slot_id.as_uuid())
            .bind(email.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    Ok(LedgerSnapshot {
        occupancy: u32::try_from(occupancy)
            .map_err(|_| StoreError::Corrupt(format!("occupancy {occupancy} out of range")))?,
        held_by_requester: held.map(BookingId::from_uuid),
    })
}

#[async_trait]
impl Catalog for PostgresSlotStore {
    async fn create_event(&self, event: NewEvent) -> Result<EventDetail> {
        event.validate()?;
        let (event, slots) = event.into_records();
        let capacity = i32::try_from(event.capacity)
            .map_err(|_| StoreError::InvalidEvent(format!("capacity {} too large", event.capacity)))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO events (id, title, description, capacity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, capacity, created_at
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(&event.description)
        .bind(capacity)
        .bind(event.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let event = Self::row_to_event(&row)?;

        let mut stored = Vec::with_capacity(slots.len());
        for slot in &slots {
            let row = sqlx::query(
                r#"
                INSERT INTO time_slots (id, event_id, start_time)
                VALUES ($1, $2, $3)
                RETURNING id, event_id, start_time
                "#,
            )
            .bind(slot.id.as_uuid())
            .bind(slot.event_id.as_uuid())
            .bind(slot.start_time)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(Self::row_to_slot(&row)?);
        }

        tx.commit().await?;

        stored.sort_by_key(|s| (s.start_time, s.id));
        tracing::debug!(event_id = %event.id, slots = stored.len(), "event created");
        Ok(EventDetail {
            event,
            slots: stored
                .into_iter()
                .map(|slot| SlotDetail {
                    slot,
                    bookings: Vec::new(),
                })
                .collect(),
        })
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, capacity, created_at
            FROM events
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT id, title, description, capacity, created_at FROM events WHERE id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn get_event_detail(&self, event_id: EventId) -> Result<Option<EventDetail>> {
        let Some(event) = self.get_event(event_id).await? else {
            return Ok(None);
        };

        let slot_rows = sqlx::query(
            r#"
            SELECT id, event_id, start_time
            FROM time_slots
            WHERE event_id = $1
            ORDER BY start_time ASC, id ASC
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let booking_rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE time_slot_id IN (SELECT id FROM time_slots WHERE event_id = $1)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut by_slot: HashMap<SlotId, Vec<Booking>> = HashMap::new();
        for row in &booking_rows {
            let booking = Self::row_to_booking(row)?;
            by_slot.entry(booking.slot_id).or_default().push(booking);
        }

        let slots = slot_rows
            .iter()
            .map(|row| {
                let slot = Self::row_to_slot(row)?;
                Ok(SlotDetail {
                    bookings: by_slot.remove(&slot.id).unwrap_or_default(),
                    slot,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(EventDetail { event, slots }))
    }

    async fn slot_exists(&self, slot_id: SlotId, event_id: EventId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM time_slots WHERE id = $1 AND event_id = $2)",
        )
        .bind(slot_id.as_uuid())
        .bind(event_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_capacity(&self, event_id: EventId) -> Result<Option<u32>> {
        let capacity: Option<i32> = sqlx::query_scalar("SELECT capacity FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        capacity
            .map(|c| {
                u32::try_from(c).map_err(|_| StoreError::Corrupt(format!("negative capacity {c}")))
            })
            .transpose()
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool> {
        let contended = || format!("event {event_id}");
        let mut tx = self.begin().await?;

        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_contention(e, contended))?;
        if found.is_none() {
            return Ok(false);
        }

        let slot_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM time_slots WHERE event_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(event_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_contention(e, contended))?;

        sqlx::query("DELETE FROM bookings WHERE time_slot_id = ANY($1)")
            .bind(&slot_ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM time_slots WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%event_id, slots = slot_ids.len(), "event deleted");
        Ok(true)
    }

    async fn delete_slot(&self, event_id: EventId, slot_id: SlotId) -> Result<bool> {
        let mut tx = self.begin().await?;

        let found: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM time_slots WHERE id = $1 AND event_id = $2 FOR UPDATE",
        )
        .bind(slot_id.as_uuid())
        .bind(event_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_contention(e, || format!("slot {slot_id}")))?;
        if found.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM bookings WHERE time_slot_id = $1")
            .bind(slot_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM time_slots WHERE id = $1")
            .bind(slot_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%event_id, %slot_id, "slot deleted");
        Ok(true)
    }
}

#[async_trait]
impl BookingLedger for PostgresSlotStore {
    async fn snapshot(&self, slot_id: SlotId, email: &Email) -> Result<LedgerSnapshot> {
        let mut conn = self.pool.acquire().await?;
        count_and_holder(&mut *conn, slot_id, email).await
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_booking).transpose()
    }

    async fn bookings_for_requester(&self, email: &Email) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE user_email = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_booking).collect()
    }

    async fn begin_slot_unit(&self, slot_id: SlotId) -> Result<Option<Box<dyn SlotUnit>>> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT s.id, s.event_id, s.start_time, e.title, e.capacity
            FROM time_slots s
            JOIN events e ON e.id = s.event_id
            WHERE s.id = $1
            FOR UPDATE OF s
            "#,
        )
        .bind(slot_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_contention(e, || format!("slot {slot_id}")))?;

        // Dropping the transaction rolls it back and releases nothing we hold
        let Some(row) = row else {
            return Ok(None);
        };

        let capacity: i32 = row.try_get("capacity")?;
        let info = SlotInfo {
            slot: Self::row_to_slot(&row)?,
            event_title: row.try_get("title")?,
            capacity: u32::try_from(capacity)
                .map_err(|_| StoreError::Corrupt(format!("negative capacity {capacity}")))?,
        };

        Ok(Some(Box::new(PgSlotUnit { tx, info })))
    }
}

struct PgSlotUnit {
    tx: Transaction<'static, Postgres>,
    info: SlotInfo,
}

#[async_trait]
impl SlotUnit for PgSlotUnit {
    fn info(&self) -> &SlotInfo {
        &self.info
    }

    async fn ledger(&mut self, email: &Email) -> Result<LedgerSnapshot> {
        count_and_holder(&mut *self.tx, self.info.slot.id, email).await
    }

    async fn insert_booking(&mut self, requester: &Requester) -> Result<Booking> {
        let booking = Booking::new(self.info.slot.id, requester.clone());
        let slot_id = self.info.slot.id;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO bookings (id, time_slot_id, user_name, user_email, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.id.as_uuid())
        .bind(slot_id.as_uuid())
        .bind(&booking.requester.name)
        .bind(booking.requester.email.as_str())
        .bind(booking.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_contention(e, || format!("slot {slot_id}")))?;

        Self::booking_from(&row)
    }

    async fn remove_booking(&mut self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "DELETE FROM bookings WHERE id = $1 AND time_slot_id = $2 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id.as_uuid())
        .bind(self.info.slot.id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(Self::booking_from).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let slot_id = self.info.slot.id;
        self.tx
            .commit()
            .await
            .map_err(|e| map_contention(e, || format!("slot {slot_id}")))
    }
}

impl PgSlotUnit {
    fn booking_from(row: &PgRow) -> Result<Booking> {
        PostgresSlotStore::row_to_booking(row)
    }
}
