//! Booking transition events.

use chrono::{DateTime, Utc};
use common::TransactionId;
use serde::{Deserialize, Serialize};

use crate::actor::Actor;

/// A change applied to a booking.
///
/// Every persisted transition is recorded as one of these in the booking's
/// history, so cancelled and refunded bookings keep a full audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// The gateway accepted a charge request.
    PaymentRequested(PaymentRequestedData),

    /// Payment settled and the seats were allocated.
    PaymentConfirmed(PaymentSettledData),

    /// Payment settled after the seat hold had lapsed; the booking is
    /// cancelled and the payment queued for reconciliation.
    PaidAfterHoldExpired(PaymentSettledData),

    /// The charge failed or never settled in time.
    PaymentFailed(PaymentFailedData),

    /// Cancelled before any money was taken.
    BookingCancelled(CancellationData),

    /// Cancelled after payment; the money has been returned.
    BookingRefunded(RefundData),

    /// The trip has departed.
    BookingCompleted(CompletionData),
}

impl BookingEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::PaymentRequested(_) => "PaymentRequested",
            BookingEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            BookingEvent::PaidAfterHoldExpired(_) => "PaidAfterHoldExpired",
            BookingEvent::PaymentFailed(_) => "PaymentFailed",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
            BookingEvent::BookingRefunded(_) => "BookingRefunded",
            BookingEvent::BookingCompleted(_) => "BookingCompleted",
        }
    }

    /// Returns when the event happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::PaymentRequested(data) => data.requested_at,
            BookingEvent::PaymentConfirmed(data) | BookingEvent::PaidAfterHoldExpired(data) => {
                data.settled_at
            }
            BookingEvent::PaymentFailed(data) => data.failed_at,
            BookingEvent::BookingCancelled(data) => data.cancelled_at,
            BookingEvent::BookingRefunded(data) => data.refunded_at,
            BookingEvent::BookingCompleted(data) => data.completed_at,
        }
    }
}

/// Data for PaymentRequested event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestedData {
    /// Reference the gateway will echo in its callback.
    pub gateway_ref: String,
    pub requested_at: DateTime<Utc>,
}

/// Data for PaymentConfirmed and PaidAfterHoldExpired events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettledData {
    pub transaction_id: TransactionId,
    pub settled_at: DateTime<Utc>,
}

/// Data for PaymentFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for BookingCancelled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationData {
    pub reason: String,
    pub cancelled_by: Actor,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for BookingRefunded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundData {
    pub reason: String,
    pub cancelled_by: Actor,
    /// Gateway refund reference, absent for cash refunds.
    pub refund_ref: Option<String>,
    pub refunded_at: DateTime<Utc>,
}

/// Data for BookingCompleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionData {
    pub completed_at: DateTime<Utc>,
}
