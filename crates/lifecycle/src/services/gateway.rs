//! Payment gateway trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::BookingId;
use domain::{BookingReference, Money};
use thiserror::Error;

/// Errors returned by the payment gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway could not be reached or timed out; safe to retry.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway refused the request; retrying will not help.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Returns true if the call may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// A request to collect payment for a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub booking_id: BookingId,
    /// Shown to the payer on the prompt.
    pub reference: BookingReference,
    pub amount: Money,
    /// Phone number or account to charge.
    pub payer_contact: String,
}

/// A request to return a settled payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub booking_id: BookingId,
    /// Gateway reference of the original charge.
    pub payment_ref: String,
    pub amount: Money,
}

/// Client for the external mobile-money gateway.
///
/// Charges settle asynchronously: `initiate` returns the gateway reference
/// that the later callback will carry as its external reference.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Starts a charge and returns its gateway reference.
    async fn initiate(&self, request: &ChargeRequest) -> Result<String, GatewayError>;

    /// Refunds a settled charge and returns the refund reference.
    async fn refund(&self, request: &RefundRequest) -> Result<String, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: Vec<(String, ChargeRequest)>,
    refunds: Vec<(String, RefundRequest)>,
    next_id: u32,
    next_refs: Vec<String>,
    unavailable_for: u32,
    reject: bool,
    attempts: u32,
}

/// In-memory payment gateway for testing and local runs.
///
/// Issues references `ws_CO_0001`, `ws_CO_0002`, ... unless specific ones
/// are queued with [`InMemoryPaymentGateway::queue_ref`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryGatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `calls` calls fail with `Unavailable`.
    pub fn set_unavailable_for(&self, calls: u32) {
        self.write().unavailable_for = calls;
    }

    /// Makes every call fail with `Rejected` until reset.
    pub fn set_reject(&self, reject: bool) {
        self.write().reject = reject;
    }

    /// Queues the reference the next successful charge will return.
    pub fn queue_ref(&self, gateway_ref: impl Into<String>) {
        self.write().next_refs.push(gateway_ref.into());
    }

    /// Returns the number of successful charges.
    pub fn charge_count(&self) -> usize {
        self.read().charges.len()
    }

    /// Returns the reference of the most recent successful charge.
    pub fn last_charge_ref(&self) -> Option<String> {
        self.read().charges.last().map(|(r, _)| r.clone())
    }

    /// Returns the charge issued for a booking, if any.
    pub fn charge_for(&self, booking_id: BookingId) -> Option<(String, ChargeRequest)> {
        self.read()
            .charges
            .iter()
            .find(|(_, c)| c.booking_id == booking_id)
            .cloned()
    }

    /// Returns the successful refunds.
    pub fn refunds(&self) -> Vec<(String, RefundRequest)> {
        self.read().refunds.clone()
    }

    /// Returns how many calls were made, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.read().attempts
    }

    fn check_failure(state: &mut InMemoryGatewayState) -> Result<(), GatewayError> {
        state.attempts += 1;
        if state.reject {
            return Err(GatewayError::Rejected("request declined".to_string()));
        }
        if state.unavailable_for > 0 {
            state.unavailable_for -= 1;
            return Err(GatewayError::Unavailable("connection timed out".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn initiate(&self, request: &ChargeRequest) -> Result<String, GatewayError> {
        let mut state = self.write();
        Self::check_failure(&mut state)?;

        state.next_id += 1;
        let gateway_ref = if state.next_refs.is_empty() {
            format!("ws_CO_{:04}", state.next_id)
        } else {
            state.next_refs.remove(0)
        };
        state.charges.push((gateway_ref.clone(), request.clone()));
        Ok(gateway_ref)
    }

    async fn refund(&self, request: &RefundRequest) -> Result<String, GatewayError> {
        let mut state = self.write();
        Self::check_failure(&mut state)?;

        state.next_id += 1;
        let refund_ref = format!("RF_{:04}", state.next_id);
        state.refunds.push((refund_ref.clone(), request.clone()));
        Ok(refund_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge() -> ChargeRequest {
        ChargeRequest {
            booking_id: BookingId::new(),
            reference: BookingReference::new("SH-TEST0001"),
            amount: Money::new(1000),
            payer_contact: "254700000001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initiate_issues_sequential_refs() {
        let gateway = InMemoryPaymentGateway::new();
        assert_eq!(gateway.initiate(&charge()).await.unwrap(), "ws_CO_0001");
        assert_eq!(gateway.initiate(&charge()).await.unwrap(), "ws_CO_0002");
        assert_eq!(gateway.charge_count(), 2);
    }

    #[tokio::test]
    async fn test_queued_ref_is_used() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.queue_ref("XYZ123");
        let request = charge();
        assert_eq!(gateway.initiate(&request).await.unwrap(), "XYZ123");
        assert_eq!(
            gateway.charge_for(request.booking_id).map(|(r, _)| r),
            Some("XYZ123".to_string())
        );
    }

    #[tokio::test]
    async fn test_unavailable_then_recovers() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_unavailable_for(1);

        let first = gateway.initiate(&charge()).await;
        assert!(matches!(first, Err(GatewayError::Unavailable(_))));
        assert!(gateway.initiate(&charge()).await.is_ok());
        assert_eq!(gateway.attempts(), 2);
    }

    #[tokio::test]
    async fn test_reject() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_reject(true);

        let result = gateway
            .refund(&RefundRequest {
                booking_id: BookingId::new(),
                payment_ref: "ws_CO_0001".to_string(),
                amount: Money::new(500),
            })
            .await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
        assert!(!result.unwrap_err().is_transient());
        assert!(gateway.refunds().is_empty());
    }
}
