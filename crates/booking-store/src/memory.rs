use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, Version};
use domain::{
    Booking, BookingReference, BookingStatus, HistoryEntry, PaymentTransaction,
    ReconciliationCase,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{BookingStore, RecordOutcome},
};

#[derive(Default)]
struct State {
    bookings: HashMap<BookingId, Booking>,
    history: HashMap<BookingId, Vec<HistoryEntry>>,
    transactions: HashMap<String, PaymentTransaction>,
    cases: Vec<ReconciliationCase>,
}

/// In-memory booking store.
///
/// Provides the same interface and guarantees as the PostgreSQL
/// implementation; used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of bookings stored.
    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    /// Returns the total number of payment transactions stored.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let mut state = self.state.write().await;

        let booking_id = booking.booking_id();
        if state.bookings.contains_key(&booking_id)
            || state
                .bookings
                .values()
                .any(|b| b.reference() == booking.reference())
        {
            return Err(StoreError::DuplicateBooking(booking_id));
        }

        state.bookings.insert(booking_id, booking.clone());
        Ok(())
    }

    async fn save_transition(
        &self,
        booking: &Booking,
        expected: Version,
        entry: &HistoryEntry,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let booking_id = booking.booking_id();

        let current = state
            .bookings
            .get(&booking_id)
            .map(|b| b.version())
            .ok_or(StoreError::BookingNotFound(booking_id))?;

        if current != expected {
            return Err(StoreError::ConcurrencyConflict {
                booking_id,
                expected,
                actual: current,
            });
        }

        state.bookings.insert(booking_id, booking.clone());
        state
            .history
            .entry(booking_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&booking_id).cloned())
    }

    async fn find_by_reference(&self, reference: &BookingReference) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.reference() == reference)
            .cloned())
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.payment_ref() == Some(payment_ref))
            .cloned())
    }

    async fn pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<_> = state
            .bookings
            .values()
            .filter(|b| b.status() == BookingStatus::PendingPayment && b.created_at() < cutoff)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at());
        Ok(bookings)
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<_> = state
            .bookings
            .values()
            .filter(|b| b.status() == status)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at());
        Ok(bookings)
    }

    async fn history(&self, booking_id: BookingId) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        Ok(state.history.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn record_transaction(&self, transaction: &PaymentTransaction) -> Result<RecordOutcome> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.transactions.get(&transaction.external_ref) {
            return Ok(RecordOutcome::Duplicate(existing.clone()));
        }

        state
            .transactions
            .insert(transaction.external_ref.clone(), transaction.clone());
        Ok(RecordOutcome::Inserted)
    }

    async fn discard_transaction(&self, external_ref: &str) -> Result<()> {
        self.state.write().await.transactions.remove(external_ref);
        Ok(())
    }

    async fn find_transaction(&self, external_ref: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .get(external_ref)
            .cloned())
    }

    async fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<PaymentTransaction>> {
        let state = self.state.read().await;
        let mut transactions: Vec<_> = state
            .transactions
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.received_at);
        Ok(transactions)
    }

    async fn open_case(&self, case: &ReconciliationCase) -> Result<()> {
        self.state.write().await.cases.push(case.clone());
        Ok(())
    }

    async fn reconciliation_cases(&self) -> Result<Vec<ReconciliationCase>> {
        Ok(self.state.read().await.cases.clone())
    }
}
