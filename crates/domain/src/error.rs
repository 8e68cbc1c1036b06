//! Lifecycle error types.

use booking_store::{BookingStatus, StoreError};
use thiserror::Error;

/// Errors raised by lifecycle and assignment operations.
///
/// Running out of providers is not an error; see
/// [`AssignmentOutcome`](crate::AssignmentOutcome).
#[derive(Debug, Error)]
pub enum BookingError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// The booking or a referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The actor may not act on this booking.
    #[error("{0}")]
    Forbidden(String),

    /// The action is not valid for the booking's current status.
    #[error("Cannot {action} a booking with status: {current} (requires {})", status_list(.required))]
    InvalidState {
        action: &'static str,
        current: BookingStatus,
        required: Vec<BookingStatus>,
    },

    /// The persistence layer failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    pub(crate) fn booking_not_found() -> Self {
        BookingError::NotFound("Booking not found".to_string())
    }

    pub(crate) fn invalid_state(
        action: &'static str,
        current: BookingStatus,
        required: &[BookingStatus],
    ) -> Self {
        BookingError::InvalidState {
            action,
            current,
            required: required.to_vec(),
        }
    }

    /// Returns true if a concurrent write won the race for this booking.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BookingError::Store(StoreError::ConcurrencyConflict { .. }))
    }
}

fn status_list(statuses: &[BookingStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(BookingStatus::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, BookingError>;
