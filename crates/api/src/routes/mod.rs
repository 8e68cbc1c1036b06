//! HTTP route handlers.

pub mod admin;
pub mod bookings;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod providers;

use booking_store::{Booking, BookingStore, EventLog};
use domain::{BookingService, CommandResult, InMemoryProviderDirectory};
use serde::Serialize;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L> {
    pub service: BookingService<S, L, InMemoryProviderDirectory>,
}

impl<S: BookingStore, L: EventLog> AppState<S, L> {
    pub fn new(service: BookingService<S, L, InMemoryProviderDirectory>) -> Self {
        Self { service }
    }
}

/// Success envelope shared by every JSON route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::data(data)
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        Self {
            count: Some(items.len()),
            ..Self::data(items)
        }
    }
}

impl From<CommandResult> for ApiResponse<Booking> {
    fn from(result: CommandResult) -> Self {
        ApiResponse::with_message(result.message, result.booking)
    }
}
