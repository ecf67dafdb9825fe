//! Lifecycle error types.

use booking_store::StoreError;
use common::{BookingId, ScheduleId};
use domain::BookingError;
use seat_inventory::InventoryError;
use thiserror::Error;

use crate::services::gateway::GatewayError;

/// Errors that can occur during booking lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Seat inventory rejected the operation.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// A booking rule or state transition was violated.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The payment gateway failed or could not be reached.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Booking not found.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// No booking carries this public reference.
    #[error("Booking not found: {0}")]
    ReferenceNotFound(String),

    /// Schedule not found in the catalog.
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),

    /// The schedule has already departed.
    #[error("Schedule {0} has already departed")]
    ScheduleDeparted(ScheduleId),

    /// A callback names a payment this engine never initiated.
    #[error("Unknown payment reference")]
    UnknownPaymentRef(String),

    /// A cash payment was recorded against a non-cash booking.
    #[error("Booking {0} is not payable in cash")]
    NotCashBooking(BookingId),
}

impl LifecycleError {
    /// Returns true if this error reports an invalid state transition.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            LifecycleError::Booking(BookingError::InvalidTransition { .. })
        )
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;
