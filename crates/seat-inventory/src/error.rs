use common::{HoldId, ScheduleId};
use domain::{BookingError, SeatNumber};
use thiserror::Error;

/// Errors returned by seat inventory operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// At least one requested seat is held or allocated.
    #[error("{} already taken, choose another", format_seats(.seats))]
    SeatUnavailable {
        schedule_id: ScheduleId,
        seats: Vec<SeatNumber>,
    },

    /// The hold expired, or was released, before it could be finalized.
    #[error("Hold expired: {0}")]
    HoldExpired(HoldId),

    /// The seat request is invalid for the schedule's layout.
    #[error(transparent)]
    InvalidRequest(#[from] BookingError),
}

fn format_seats(seats: &[SeatNumber]) -> String {
    let numbers = seats
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if seats.len() == 1 {
        format!("Seat {numbers}")
    } else {
        format!("Seats {numbers}")
    }
}

/// Result type for seat inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
