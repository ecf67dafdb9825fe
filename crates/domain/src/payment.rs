//! Payment methods and gateway transactions.

use chrono::{DateTime, Utc};
use common::{BookingId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::value_objects::Money;

/// How a passenger pays for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Mpesa,
    Cash,
    Card,
}

impl PaymentMethod {
    /// Returns true if the charge is collected through the payment gateway.
    ///
    /// Cash is collected at the counter and recorded by an operator.
    pub fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Mpesa | PaymentMethod::Card)
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mpesa" => Ok(PaymentMethod::Mpesa),
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Outcome reported by a gateway callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl CallbackStatus {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackStatus::Success => "success",
            CallbackStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CallbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(CallbackStatus::Success),
            "failed" => Ok(CallbackStatus::Failed),
            other => Err(format!("unknown callback status: {other}")),
        }
    }
}

/// A gateway callback as first received. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub booking_id: BookingId,
    /// Gateway reference; at most one transaction exists per value.
    pub external_ref: String,
    pub amount: Money,
    pub status: CallbackStatus,
    pub received_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Creates a transaction record for a first-seen callback.
    pub fn new(
        booking_id: BookingId,
        external_ref: impl Into<String>,
        amount: Money,
        status: CallbackStatus,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            booking_id,
            external_ref: external_ref.into(),
            amount,
            status,
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_methods() {
        assert!(PaymentMethod::Mpesa.uses_gateway());
        assert!(PaymentMethod::Card.uses_gateway());
        assert!(!PaymentMethod::Cash.uses_gateway());
    }

    #[test]
    fn test_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Mpesa).unwrap(),
            "\"mpesa\""
        );
        assert_eq!("card".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_callback_status_wire_names() {
        let status: CallbackStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, CallbackStatus::Success);
        assert_eq!(CallbackStatus::Failed.as_str(), "failed");
    }
}
