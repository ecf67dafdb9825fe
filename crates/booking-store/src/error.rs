use common::{BookingId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the booking store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The booking was modified since it was read.
    #[error(
        "Concurrency conflict for booking {booking_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        booking_id: BookingId,
        expected: Version,
        actual: Version,
    },

    /// The booking was not found.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// A booking with this ID or reference already exists.
    #[error("Duplicate booking: {0}")]
    DuplicateBooking(BookingId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for booking store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
