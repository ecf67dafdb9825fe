//! Seat inventory for scheduled departures.
//!
//! Every schedule has one authoritative lock over its seat state. Holds are
//! all-or-nothing across the requested seats and expire after a TTL; a
//! finalized hold becomes a permanent allocation tied to a booking.

pub mod error;
pub mod inventory;
mod seats;

pub use error::{InventoryError, Result};
pub use inventory::{InventoryStats, SeatInventory};
