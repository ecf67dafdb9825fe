//! Booking record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{BookingId, ScheduleId, TransactionId, Version};
use serde::{Deserialize, Serialize};

use super::events::{
    BookingEvent, CancellationData, CompletionData, PaymentFailedData, PaymentRequestedData,
    PaymentSettledData, RefundData,
};
use super::state::{BookingStatus, PaymentStatus};
use crate::actor::Actor;
use crate::error::BookingError;
use crate::hold::HoldToken;
use crate::payment::PaymentMethod;
use crate::schedule::Schedule;
use crate::value_objects::{BookingReference, CustomerId, Money, SeatNumber};

/// Input for creating a booking once its seats are held.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_id: BookingId,
    pub customer_id: CustomerId,
    pub seats: BTreeSet<SeatNumber>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// A seat booking.
///
/// Decision methods (`confirm_payment`, `cancel`, ...) check the state
/// machine and return the event to apply; [`Booking::apply`] performs the
/// mutation. Nothing else changes `status` or `payment_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    booking_id: BookingId,
    reference: BookingReference,
    schedule_id: ScheduleId,
    seats: BTreeSet<SeatNumber>,
    customer_id: CustomerId,
    status: BookingStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    total_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    notes: Option<String>,
    /// Hold granted at creation; finalized or released by the lifecycle.
    hold: HoldToken,
    /// Gateway reference of the outstanding charge, if one was initiated.
    payment_ref: Option<String>,
    #[serde(default)]
    version: Version,
}

/// One persisted transition of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub booking_id: BookingId,
    /// Booking version after this transition.
    pub version: Version,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub event: BookingEvent,
    pub recorded_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a booking in `PendingPayment` for seats already held.
    ///
    /// The total is always `price_per_seat × seat count`.
    pub fn create(
        input: NewBooking,
        schedule: &Schedule,
        hold: HoldToken,
        now: DateTime<Utc>,
    ) -> Result<Self, BookingError> {
        schedule.validate_seats(&input.seats)?;

        Ok(Self {
            booking_id: input.booking_id,
            reference: BookingReference::generate(),
            schedule_id: schedule.schedule_id,
            total_amount: schedule.price_for(input.seats.len()),
            seats: input.seats,
            customer_id: input.customer_id,
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            created_at: now,
            updated_at: now,
            notes: input.notes,
            hold,
            payment_ref: None,
            version: Version::first(),
        })
    }
}

// Query methods
impl Booking {
    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    pub fn reference(&self) -> &BookingReference {
        &self.reference
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.schedule_id
    }

    pub fn seats(&self) -> &BTreeSet<SeatNumber> {
        &self.seats
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn hold(&self) -> &HoldToken {
        &self.hold
    }

    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if cancelling requires returning money first.
    pub fn requires_refund(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

// Decision methods (return the event to apply)
impl Booking {
    /// Records the gateway reference of an initiated charge.
    pub fn request_payment(
        &self,
        gateway_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure(self.status.awaits_payment(), "request payment for")?;

        Ok(BookingEvent::PaymentRequested(PaymentRequestedData {
            gateway_ref: gateway_ref.into(),
            requested_at: now,
        }))
    }

    /// Checks that a received amount matches the booking total.
    pub fn check_amount(&self, received: Money) -> Result<(), BookingError> {
        if received != self.total_amount {
            return Err(BookingError::PaymentMismatch {
                expected: self.total_amount,
                received,
            });
        }
        Ok(())
    }

    /// Confirms a settled payment whose hold was finalized.
    pub fn confirm_payment(
        &self,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure(self.status.awaits_payment(), "confirm payment for")?;

        Ok(BookingEvent::PaymentConfirmed(PaymentSettledData {
            transaction_id,
            settled_at: now,
        }))
    }

    /// Rolls back a booking whose payment arrived after the hold lapsed.
    pub fn reject_late_payment(
        &self,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure(self.status.awaits_payment(), "settle late payment for")?;

        Ok(BookingEvent::PaidAfterHoldExpired(PaymentSettledData {
            transaction_id,
            settled_at: now,
        }))
    }

    /// Marks the charge as failed or timed out.
    pub fn fail_payment(
        &self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure(self.status.awaits_payment(), "fail payment for")?;

        Ok(BookingEvent::PaymentFailed(PaymentFailedData {
            reason: reason.into(),
            failed_at: now,
        }))
    }

    /// Cancels a booking that has not been paid.
    pub fn cancel(
        &self,
        reason: impl Into<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure_actor(actor, "cancel")?;
        self.ensure(self.status.can_cancel() && !self.requires_refund(), "cancel")?;

        Ok(BookingEvent::BookingCancelled(CancellationData {
            reason: reason.into(),
            cancelled_by: actor.clone(),
            cancelled_at: now,
        }))
    }

    /// Cancels a paid booking once its money has been returned.
    pub fn refund(
        &self,
        reason: impl Into<String>,
        actor: &Actor,
        refund_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BookingEvent, BookingError> {
        self.ensure_actor(actor, "cancel")?;
        self.ensure(self.status.can_cancel() && self.requires_refund(), "refund")?;

        Ok(BookingEvent::BookingRefunded(RefundData {
            reason: reason.into(),
            cancelled_by: actor.clone(),
            refund_ref,
            refunded_at: now,
        }))
    }

    /// Checks that `actor` may cancel, and that the booking is cancellable.
    pub fn check_cancellable(&self, actor: &Actor) -> Result<(), BookingError> {
        self.ensure_actor(actor, "cancel")?;
        self.ensure(self.status.can_cancel(), "cancel")
    }

    /// Completes a confirmed booking after departure.
    pub fn complete(&self, now: DateTime<Utc>) -> Result<BookingEvent, BookingError> {
        self.ensure(self.status.can_complete(), "complete")?;

        Ok(BookingEvent::BookingCompleted(CompletionData { completed_at: now }))
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), BookingError> {
        if allowed {
            Ok(())
        } else {
            Err(BookingError::InvalidTransition {
                current: self.status,
                action,
            })
        }
    }

    fn ensure_actor(&self, actor: &Actor, action: &'static str) -> Result<(), BookingError> {
        if actor.may_act_for(&self.customer_id) {
            Ok(())
        } else {
            Err(BookingError::Forbidden { action })
        }
    }
}

impl Booking {
    /// Applies an event and returns the history entry to persist with it.
    ///
    /// Bumps the version by one.
    pub fn apply(&mut self, event: BookingEvent) -> HistoryEntry {
        let from = self.status;

        match &event {
            BookingEvent::PaymentRequested(data) => {
                self.payment_ref = Some(data.gateway_ref.clone());
            }
            BookingEvent::PaymentConfirmed(_) => {
                self.status = BookingStatus::Confirmed;
                self.payment_status = PaymentStatus::Paid;
            }
            BookingEvent::PaidAfterHoldExpired(_) => {
                self.status = BookingStatus::Cancelled;
                self.payment_status = PaymentStatus::Paid;
            }
            BookingEvent::PaymentFailed(_) => {
                self.status = BookingStatus::Cancelled;
                self.payment_status = PaymentStatus::Failed;
            }
            BookingEvent::BookingCancelled(_) => {
                self.status = BookingStatus::Cancelled;
            }
            BookingEvent::BookingRefunded(_) => {
                self.status = BookingStatus::Refunded;
                self.payment_status = PaymentStatus::Refunded;
            }
            BookingEvent::BookingCompleted(_) => {
                self.status = BookingStatus::Completed;
            }
        }

        self.version = self.version.next();
        self.updated_at = event.occurred_at();

        HistoryEntry {
            booking_id: self.booking_id,
            version: self.version,
            from,
            to: self.status,
            recorded_at: self.updated_at,
            event,
        }
    }
}
