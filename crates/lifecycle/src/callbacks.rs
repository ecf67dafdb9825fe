//! Asynchronous payment confirmations.

use booking_store::{BookingStore, RecordOutcome};
use common::BookingId;
use domain::{
    Actor, Booking, BookingError, BookingStatus, CallbackStatus, Money, PaymentMethod, PaymentTransaction,
    ReconciliationCase, ReconciliationReason, Role,
};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, Result};
use crate::lifecycle::BookingLifecycle;

/// A payment confirmation as delivered by the gateway webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    /// Gateway reference returned when the charge was initiated.
    pub external_ref: String,
    pub status: CallbackStatus,
    pub amount: Money,
}

/// What a callback did to its booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The booking moved to the given status.
    Applied(BookingStatus),
    /// The external reference was already processed; nothing changed.
    Duplicate,
    /// The payment was queued for an operator instead of being applied.
    Reconciliation(ReconciliationReason),
    /// A failure report for a booking no longer awaiting payment.
    Ignored(BookingStatus),
}

impl CallbackOutcome {
    /// Returns a short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallbackOutcome::Applied(_) => "applied",
            CallbackOutcome::Duplicate => "duplicate",
            CallbackOutcome::Reconciliation(_) => "reconciliation",
            CallbackOutcome::Ignored(_) => "ignored",
        }
    }
}

impl<S: BookingStore> BookingLifecycle<S> {
    /// Handles a gateway callback.
    ///
    /// Idempotent per external reference: only the first delivery is
    /// recorded and acted on, redeliveries return `Duplicate`. A success
    /// whose amount differs from the booking total is never applied.
    #[tracing::instrument(skip(self, callback), fields(external_ref = %callback.external_ref, status = callback.status.as_str()))]
    pub async fn handle_callback(&self, callback: PaymentCallback) -> Result<CallbackOutcome> {
        let booking = self
            .store
            .find_by_payment_ref(&callback.external_ref)
            .await?
            .ok_or_else(|| LifecycleError::UnknownPaymentRef(callback.external_ref.clone()))?;

        self.apply_callback(booking.booking_id(), callback).await
    }

    /// Records a cash payment taken at the counter.
    ///
    /// Goes through the same path as a gateway callback, keyed by a
    /// reference derived from the booking, so recording it twice is a no-op.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn record_cash_payment(
        &self,
        booking_id: BookingId,
        amount: Money,
        actor: &Actor,
    ) -> Result<CallbackOutcome> {
        if actor.role != Role::Operator {
            return Err(BookingError::Forbidden {
                action: "record a cash payment for",
            }
            .into());
        }

        let booking = self.load(booking_id).await?;
        if booking.payment_method() != PaymentMethod::Cash {
            return Err(LifecycleError::NotCashBooking(booking_id));
        }

        let callback = PaymentCallback {
            external_ref: format!("CASH-{}", booking.reference()),
            status: CallbackStatus::Success,
            amount,
        };
        self.apply_callback(booking_id, callback).await
    }

    async fn apply_callback(
        &self,
        booking_id: BookingId,
        callback: PaymentCallback,
    ) -> Result<CallbackOutcome> {
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;
        let now = self.clock.now();

        let transaction = PaymentTransaction::new(
            booking_id,
            callback.external_ref,
            callback.amount,
            callback.status,
            now,
        );

        if let RecordOutcome::Duplicate(existing) =
            self.store.record_transaction(&transaction).await?
        {
            tracing::info!(
                first_received_at = %existing.received_at,
                "duplicate callback ignored"
            );
            metrics::counter!("payment_callbacks_total", "outcome" => "duplicate").increment(1);
            return Ok(CallbackOutcome::Duplicate);
        }

        let outcome = match self.settle_callback(booking, &transaction).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.undo_record(&transaction, &e).await;
                return Err(e);
            }
        };

        metrics::counter!("payment_callbacks_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    async fn settle_callback(
        &self,
        booking: Booking,
        transaction: &PaymentTransaction,
    ) -> Result<CallbackOutcome> {
        let outcome = match transaction.status {
            CallbackStatus::Failed if booking.status().awaits_payment() => {
                let booking = self
                    .fail_locked(booking, "payment failed at gateway".to_string())
                    .await?;
                CallbackOutcome::Applied(booking.status())
            }
            CallbackStatus::Failed => CallbackOutcome::Ignored(booking.status()),
            CallbackStatus::Success => {
                if let Err(BookingError::PaymentMismatch { expected, received }) =
                    booking.check_amount(transaction.amount)
                {
                    let reason = ReconciliationReason::PaymentMismatch { expected, received };
                    self.raise(transaction, reason.clone()).await?;
                    CallbackOutcome::Reconciliation(reason)
                } else if !booking.status().awaits_payment() {
                    let reason = ReconciliationReason::PaidWhileNotPending {
                        status: booking.status(),
                    };
                    self.raise(transaction, reason.clone()).await?;
                    CallbackOutcome::Reconciliation(reason)
                } else {
                    let booking = self.settle_locked(booking, transaction).await?;
                    match booking.status() {
                        BookingStatus::Confirmed => CallbackOutcome::Applied(booking.status()),
                        _ => CallbackOutcome::Reconciliation(
                            ReconciliationReason::PaidAfterHoldExpired,
                        ),
                    }
                }
            }
        };
        Ok(outcome)
    }

    /// Forgets a recorded transaction whose effects were not saved, so the
    /// gateway's redelivery is processed instead of ignored. If even that
    /// fails the payment is queued for an operator.
    async fn undo_record(&self, transaction: &PaymentTransaction, cause: &LifecycleError) {
        tracing::error!(booking_id = %transaction.booking_id, error = %cause, "callback not applied");
        metrics::counter!("payment_callbacks_total", "outcome" => "error").increment(1);

        match self.store.discard_transaction(&transaction.external_ref).await {
            Ok(()) => tracing::info!("payment transaction discarded, awaiting redelivery"),
            Err(e) => {
                tracing::error!(error = %e, "could not discard payment transaction");
                if let Err(e) = self
                    .raise(transaction, ReconciliationReason::SettlementFailed)
                    .await
                {
                    tracing::error!(
                        booking_id = %transaction.booking_id,
                        external_ref = %transaction.external_ref,
                        error = %e,
                        "payment neither applied nor queued for reconciliation"
                    );
                }
            }
        }
    }

    async fn raise(
        &self,
        transaction: &PaymentTransaction,
        reason: ReconciliationReason,
    ) -> Result<()> {
        let case = ReconciliationCase::open(
            transaction.booking_id,
            Some(transaction.external_ref.clone()),
            transaction.amount,
            reason,
            transaction.received_at,
        );
        self.open_case(case).await
    }
}
