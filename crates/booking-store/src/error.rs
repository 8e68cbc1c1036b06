use thiserror::Error;

use crate::{BookingId, Version};

/// Errors that can occur when interacting with the booking store or event log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent write changed the booking since it was loaded.
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for booking {booking_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        booking_id: BookingId,
        expected: Version,
        actual: Version,
    },

    /// A booking with this ID was already inserted.
    #[error("Booking already exists: {0}")]
    DuplicateBooking(BookingId),

    /// The booking to update does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

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

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
