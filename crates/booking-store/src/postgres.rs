use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, TransactionId, Version};
use domain::{
    Booking, BookingReference, BookingStatus, CallbackStatus, HistoryEntry, Money,
    PaymentTransaction, ReconciliationCase,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{BookingStore, RecordOutcome},
};

const BOOKING_COLUMNS: &str = "data";

/// PostgreSQL-backed booking store.
///
/// Each booking is kept as a JSONB document next to the columns it is
/// queried by; the `version` column carries the optimistic concurrency check.
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
        tracing::info!("booking store migrations applied");
        Ok(())
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let data: serde_json::Value = row.try_get("data")?;
        Ok(serde_json::from_value(data)?)
    }

    fn row_to_transaction(row: PgRow) -> Result<PaymentTransaction> {
        let status: String = row.try_get("status")?;
        let status: CallbackStatus = serde_json::from_value(serde_json::Value::String(status))?;

        Ok(PaymentTransaction {
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
            external_ref: row.try_get("external_ref")?,
            amount: Money::new(row.try_get("amount")?),
            status,
            received_at: row.try_get("received_at")?,
        })
    }

    async fn fetch_one_booking(&self, sql: &str, value: &str) -> Result<Option<Booking>> {
        let row = sqlx::query(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn current_version(&self, booking_id: BookingId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM bookings WHERE booking_id = $1")
                .bind(booking_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let data = serde_json::to_value(booking)?;
        let booking_id = booking.booking_id();

        sqlx::query(
            r#"
            INSERT INTO bookings (booking_id, reference, schedule_id, customer_id, status, payment_ref, version, created_at, updated_at, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(booking.reference().as_str())
        .bind(booking.schedule_id().as_uuid())
        .bind(booking.customer_id().as_str())
        .bind(booking.status().as_str())
        .bind(booking.payment_ref())
        .bind(booking.version().as_i64())
        .bind(booking.created_at())
        .bind(booking.updated_at())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateBooking(booking_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, booking, entry), fields(booking_id = %booking.booking_id()))]
    async fn save_transition(
        &self,
        booking: &Booking,
        expected: Version,
        entry: &HistoryEntry,
    ) -> Result<()> {
        let booking_id = booking.booking_id();
        let data = serde_json::to_value(booking)?;
        let event = serde_json::to_value(&entry.event)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $3, payment_ref = $4, version = $5, updated_at = $6, data = $7
            WHERE booking_id = $1 AND version = $2
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(expected.as_i64())
        .bind(booking.status().as_str())
        .bind(booking.payment_ref())
        .bind(booking.version().as_i64())
        .bind(booking.updated_at())
        .bind(data)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return match self.current_version(booking_id).await? {
                Some(actual) => {
                    metrics::counter!("store_concurrency_conflicts_total").increment(1);
                    tracing::warn!(%expected, %actual, "stale booking version");
                    Err(StoreError::ConcurrencyConflict {
                        booking_id,
                        expected,
                        actual,
                    })
                }
                None => Err(StoreError::BookingNotFound(booking_id)),
            };
        }

        sqlx::query(
            r#"
            INSERT INTO booking_history (booking_id, version, from_status, to_status, event_type, event, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(entry.version.as_i64())
        .bind(entry.from.as_str())
        .bind(entry.to.as_str())
        .bind(entry.event.event_type())
        .bind(event)
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1"
        ))
        .bind(booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn find_by_reference(&self, reference: &BookingReference) -> Result<Option<Booking>> {
        self.fetch_one_booking(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = $1"),
            reference.as_str(),
        )
        .await
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Booking>> {
        self.fetch_one_booking(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_ref = $1"),
            payment_ref,
        )
        .await
    }

    async fn pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE status = $1 AND created_at < $2
            ORDER BY created_at ASC
            "#
        ))
        .bind(BookingStatus::PendingPayment.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn history(&self, booking_id: BookingId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT version, from_status, to_status, event, recorded_at
            FROM booking_history
            WHERE booking_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let from: String = row.try_get("from_status")?;
                let to: String = row.try_get("to_status")?;
                let event: serde_json::Value = row.try_get("event")?;
                Ok(HistoryEntry {
                    booking_id,
                    version: Version::new(row.try_get("version")?),
                    from: serde_json::from_value(serde_json::Value::String(from))?,
                    to: serde_json::from_value(serde_json::Value::String(to))?,
                    event: serde_json::from_value(event)?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, transaction), fields(external_ref = %transaction.external_ref))]
    async fn record_transaction(&self, transaction: &PaymentTransaction) -> Result<RecordOutcome> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO payment_transactions (transaction_id, booking_id, external_ref, amount, status, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_ref) DO NOTHING
            RETURNING transaction_id
            "#,
        )
        .bind(transaction.transaction_id.as_uuid())
        .bind(transaction.booking_id.as_uuid())
        .bind(&transaction.external_ref)
        .bind(transaction.amount.amount())
        .bind(transaction.status.as_str())
        .bind(transaction.received_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(RecordOutcome::Inserted);
        }
        tracing::debug!("payment transaction already recorded");

        match self.find_transaction(&transaction.external_ref).await? {
            Some(existing) => Ok(RecordOutcome::Duplicate(existing)),
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn discard_transaction(&self, external_ref: &str) -> Result<()> {
        sqlx::query("DELETE FROM payment_transactions WHERE external_ref = $1")
            .bind(external_ref)
            .execute(&self.pool)
            .await?;
        tracing::debug!("payment transaction discarded");
        Ok(())
    }

    async fn find_transaction(&self, external_ref: &str) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, booking_id, external_ref, amount, status, received_at
            FROM payment_transactions
            WHERE external_ref = $1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<PaymentTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT transaction_id, booking_id, external_ref, amount, status, received_at
            FROM payment_transactions
            WHERE booking_id = $1
            ORDER BY received_at ASC
            "#,
        )
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn open_case(&self, case: &ReconciliationCase) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_cases (case_id, booking_id, external_ref, amount, reason, data, raised_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(case.case_id.as_uuid())
        .bind(case.booking_id.as_uuid())
        .bind(&case.external_ref)
        .bind(case.amount.amount())
        .bind(case.reason.label())
        .bind(serde_json::to_value(case)?)
        .bind(case.raised_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reconciliation_cases(&self) -> Result<Vec<ReconciliationCase>> {
        let rows = sqlx::query("SELECT data FROM reconciliation_cases ORDER BY raised_at ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.try_get("data")?;
                Ok(serde_json::from_value(data)?)
            })
            .collect()
    }
}
