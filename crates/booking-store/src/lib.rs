//! Persistence for bookings and everything recorded against them.
//!
//! The store holds no business rules. It offers:
//! - Booking records with optimistic concurrency on a per-booking `Version`
//! - An append-only transition history per booking
//! - Payment transactions, unique per gateway reference
//! - The manual reconciliation queue

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;
pub use store::{BookingStore, RecordOutcome};
