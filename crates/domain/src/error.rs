//! Domain error types.

use thiserror::Error;

use crate::booking::BookingStatus;
use crate::value_objects::{Money, SeatNumber};

/// Errors raised by booking rules and state transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The booking is not in a state that allows the requested action.
    #[error("Invalid transition: cannot {action} a {current} booking")]
    InvalidTransition {
        current: BookingStatus,
        action: &'static str,
    },

    /// A payment amount disagrees with the booking total.
    #[error("Payment mismatch: expected {expected}, received {received}")]
    PaymentMismatch { expected: Money, received: Money },

    /// A booking must name at least one seat.
    #[error("No seats requested")]
    NoSeats,

    /// The seat number is not sellable on this schedule's layout.
    #[error("Seat {seat} is not sellable on a {capacity}-seat layout")]
    InvalidSeat { seat: SeatNumber, capacity: u16 },

    /// Capacity does not match any supported vehicle layout.
    #[error("Unsupported capacity: {0}")]
    UnsupportedCapacity(u16),

    /// The actor is not allowed to act on this booking.
    #[error("Not permitted to {action} this booking")]
    Forbidden { action: &'static str },
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, BookingError>;
