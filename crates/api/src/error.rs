//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking_store::StoreError;
use domain::BookingError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller's role may not use this route.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Lifecycle operation failed.
    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Booking(err) => booking_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn booking_error_to_response(err: BookingError) -> (StatusCode, String) {
    match &err {
        BookingError::Validation(_) | BookingError::InvalidState { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        BookingError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        BookingError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        BookingError::Store(StoreError::ConcurrencyConflict { .. }) => (
            StatusCode::CONFLICT,
            "Booking was modified concurrently, please retry".to_string(),
        ),
        BookingError::Store(StoreError::BookingNotFound(_)) => {
            (StatusCode::NOT_FOUND, "Booking not found".to_string())
        }
        BookingError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use booking_store::{BookingId, BookingStatus, Version};

    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().status_and_message().0
    }

    #[test]
    fn test_booking_error_status_codes() {
        assert_eq!(
            status_of(BookingError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BookingError::NotFound("gone".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BookingError::Forbidden("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(BookingError::InvalidState {
                action: "accept",
                current: BookingStatus::Completed,
                required: vec![BookingStatus::Assigned],
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = BookingError::Store(StoreError::ConcurrencyConflict {
            booking_id: BookingId::new(),
            expected: Version::new(2),
            actual: Version::new(3),
        });
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_fault_is_not_leaked() {
        let err = BookingError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let (status, message) = ApiError::from(err).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn test_identity_errors() {
        assert_eq!(
            status_of(ApiError::Unauthorized("who".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("role".into())),
            StatusCode::FORBIDDEN
        );
    }
}
