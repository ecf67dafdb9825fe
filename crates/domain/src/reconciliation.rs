//! Payment events the engine refuses to resolve on its own.

use chrono::{DateTime, Utc};
use common::{BookingId, CaseId};
use serde::{Deserialize, Serialize};

use crate::booking::BookingStatus;
use crate::value_objects::Money;

/// Why a payment needs an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationReason {
    /// Callback amount differs from the booking total.
    PaymentMismatch { expected: Money, received: Money },
    /// Payment succeeded after the seat hold had expired; the booking was
    /// cancelled and the money must be returned.
    PaidAfterHoldExpired,
    /// Payment succeeded for a booking that was no longer awaiting payment.
    PaidWhileNotPending { status: BookingStatus },
    /// A paid booking was cancelled without a gateway refund, e.g. a cash
    /// booking; the money is returned by hand.
    ManualRefundDue,
    /// A payment was recorded but the booking update that should follow
    /// it could not be saved or undone.
    SettlementFailed,
}

impl ReconciliationReason {
    /// Returns a short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationReason::PaymentMismatch { .. } => "payment_mismatch",
            ReconciliationReason::PaidAfterHoldExpired => "paid_after_hold_expired",
            ReconciliationReason::PaidWhileNotPending { .. } => "paid_while_not_pending",
            ReconciliationReason::ManualRefundDue => "manual_refund_due",
            ReconciliationReason::SettlementFailed => "settlement_failed",
        }
    }
}

impl std::fmt::Display for ReconciliationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationReason::PaymentMismatch { expected, received } => {
                write!(f, "paid {received}, expected {expected}")
            }
            ReconciliationReason::PaidAfterHoldExpired => {
                write!(f, "paid after the seat hold expired")
            }
            ReconciliationReason::PaidWhileNotPending { status } => {
                write!(f, "paid while booking was {status}")
            }
            ReconciliationReason::ManualRefundDue => write!(f, "refund must be paid out by hand"),
            ReconciliationReason::SettlementFailed => {
                write!(f, "payment recorded but the booking was not updated")
            }
        }
    }
}

/// An entry in the manual reconciliation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCase {
    pub case_id: CaseId,
    pub booking_id: BookingId,
    pub external_ref: Option<String>,
    pub amount: Money,
    pub reason: ReconciliationReason,
    pub raised_at: DateTime<Utc>,
}

impl ReconciliationCase {
    /// Opens a new case.
    pub fn open(
        booking_id: BookingId,
        external_ref: Option<String>,
        amount: Money,
        reason: ReconciliationReason,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            case_id: CaseId::new(),
            booking_id,
            external_ref,
            amount,
            reason,
            raised_at,
        }
    }
}
