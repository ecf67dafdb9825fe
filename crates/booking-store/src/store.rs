use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, Version};
use domain::{
    Booking, BookingReference, BookingStatus, HistoryEntry, PaymentTransaction,
    ReconciliationCase,
};

use crate::Result;

/// Outcome of recording a payment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First delivery for this external reference; the transaction was stored.
    Inserted,
    /// A transaction with this external reference already exists.
    Duplicate(PaymentTransaction),
}

impl RecordOutcome {
    /// Returns true if this call stored the transaction.
    pub fn is_inserted(&self) -> bool {
        matches!(self, RecordOutcome::Inserted)
    }
}

/// Core trait for booking store implementations.
///
/// The store persists what the lifecycle decides and nothing more. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a newly created booking.
    ///
    /// Fails with `DuplicateBooking` if the ID or reference is taken.
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    /// Persists a transitioned booking together with its history entry.
    ///
    /// `expected` is the version the booking had when it was read; the
    /// write fails with `ConcurrencyConflict` if the stored version differs.
    async fn save_transition(
        &self,
        booking: &Booking,
        expected: Version,
        entry: &HistoryEntry,
    ) -> Result<()>;

    /// Retrieves a booking by ID.
    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Retrieves a booking by its public reference.
    async fn find_by_reference(&self, reference: &BookingReference) -> Result<Option<Booking>>;

    /// Retrieves the booking whose outstanding charge has this gateway reference.
    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Booking>>;

    /// Lists `PendingPayment` bookings created strictly before `cutoff`.
    async fn pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>>;

    /// Lists bookings in the given status, oldest first.
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;

    /// Returns the transition history of a booking, in version order.
    async fn history(&self, booking_id: BookingId) -> Result<Vec<HistoryEntry>>;

    /// Records a payment transaction unless its external reference is known.
    ///
    /// Insert-if-absent is atomic: of two concurrent calls with the same
    /// external reference exactly one sees `Inserted`.
    async fn record_transaction(&self, transaction: &PaymentTransaction) -> Result<RecordOutcome>;

    /// Removes a recorded transaction whose effects could not be saved,
    /// so a redelivery of the same callback is processed again.
    async fn discard_transaction(&self, external_ref: &str) -> Result<()>;

    /// Retrieves a transaction by its external reference.
    async fn find_transaction(&self, external_ref: &str) -> Result<Option<PaymentTransaction>>;

    /// Lists the transactions recorded against a booking.
    async fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<PaymentTransaction>>;

    /// Queues a case for manual reconciliation.
    async fn open_case(&self, case: &ReconciliationCase) -> Result<()>;

    /// Lists reconciliation cases, oldest first.
    async fn reconciliation_cases(&self) -> Result<Vec<ReconciliationCase>>;
}
