use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ActorRole, Booking, BookingId, BookingOrder, BookingQuery, BookingStatus, EventId,
    EventLogEntry, EventLogQuery, Result, StoreError, UserId, Version,
    store::{BookingStore, EventLog, StatusCounts},
};

/// PostgreSQL-backed booking store.
///
/// The full booking is kept as a JSONB document; the columns used for
/// filtering and ordering are duplicated alongside it.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new PostgreSQL booking store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let document: serde_json::Value = row.try_get("document")?;
        let mut booking: Booking = serde_json::from_value(document)?;
        booking.set_version(Version::new(row.try_get("version")?));
        Ok(booking)
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<Version> {
        let booking_id = booking.id();
        let document = serde_json::to_value(booking)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, customer_id, provider_id, service_type, status, scheduled_date, created_at, updated_at, version, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(booking.customer_id().as_str())
        .bind(booking.provider_id().map(UserId::as_str))
        .bind(booking.service_type())
        .bind(booking.status().as_str())
        .bind(booking.scheduled_date())
        .bind(booking.created_at())
        .bind(booking.updated_at())
        .bind(Version::first().as_i64())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("bookings_pkey")
            {
                return StoreError::DuplicateBooking(booking_id);
            }
            StoreError::Database(e)
        })?;

        Ok(Version::first())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT version, document FROM bookings WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn save(&self, booking: &Booking) -> Result<Version> {
        let booking_id = booking.id();
        let expected = booking.version();
        let new_version = expected.next();
        let document = serde_json::to_value(booking)?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET provider_id = $3, status = $4, updated_at = $5, version = $6, document = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(expected.as_i64())
        .bind(booking.provider_id().map(UserId::as_str))
        .bind(booking.status().as_str())
        .bind(booking.updated_at())
        .bind(new_version.as_i64())
        .bind(document)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(new_version);
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM bookings WHERE id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => {
                metrics::counter!("booking_store_conflicts_total").increment(1);
                Err(StoreError::ConcurrencyConflict {
                    booking_id,
                    expected,
                    actual: Version::new(actual),
                })
            }
            None => Err(StoreError::BookingNotFound(booking_id)),
        }
    }

    async fn find(&self, query: BookingQuery) -> Result<Vec<Booking>> {
        let mut sql = String::from("SELECT version, document FROM bookings WHERE 1=1");
        let mut param_count = 0;

        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.service_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND service_type = ${param_count}"));
        }
        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.provider_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND provider_id = ${param_count}"));
        }

        match query.order {
            BookingOrder::NewestFirst => sql.push_str(" ORDER BY created_at DESC, id DESC"),
            BookingOrder::ScheduledDate => {
                sql.push_str(" ORDER BY scheduled_date ASC, document->>'scheduledTime' ASC")
            }
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(service_type) = query.service_type {
            sqlx_query = sqlx_query.bind(service_type);
        }
        if let Some(customer_id) = query.customer_id {
            sqlx_query = sqlx_query.bind(customer_id.as_str().to_string());
        }
        if let Some(provider_id) = query.provider_id {
            sqlx_query = sqlx_query.bind(provider_id.as_str().to_string());
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn count_by_status(&self) -> Result<StatusCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM bookings GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            match status.parse::<BookingStatus>() {
                Ok(status) => counts.add(status, count as u64),
                Err(e) => tracing::warn!(error = %e, "Skipping bookings with unknown status"),
            }
        }
        Ok(counts)
    }
}

/// PostgreSQL-backed append-only event log.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: PgRow) -> Result<EventLogEntry> {
        let action: String = row.try_get("action")?;
        let role: String = row.try_get("performed_by_role")?;
        let performed_by: Option<String> = row.try_get("performed_by")?;

        Ok(EventLogEntry {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
            action: serde_json::from_value(serde_json::Value::String(action))?,
            performed_by: performed_by.map(UserId::new),
            performed_by_role: serde_json::from_value::<ActorRole>(serde_json::Value::String(
                role,
            ))?,
            details: row.try_get("details")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, entry: EventLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_logs (id, booking_id, action, performed_by, performed_by_role, details, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.event_id.as_uuid())
        .bind(entry.booking_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.performed_by.as_ref().map(UserId::as_str))
        .bind(entry.performed_by_role.as_str())
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, query: EventLogQuery) -> Result<Vec<EventLogEntry>> {
        let mut sql = String::from(
            "SELECT id, booking_id, action, performed_by, performed_by_role, details, timestamp FROM event_logs WHERE 1=1",
        );
        let mut param_count = 0;

        if query.booking_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND booking_id = ${param_count}"));
        }
        if query.action.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND action = ${param_count}"));
        }

        sql.push_str(" ORDER BY timestamp DESC, seq DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(booking_id) = query.booking_id {
            sqlx_query = sqlx_query.bind(booking_id.as_uuid());
        }
        if let Some(action) = query.action {
            sqlx_query = sqlx_query.bind(action.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
