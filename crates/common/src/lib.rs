//! Shared identifiers and actor roles used across the booking marketplace.

mod types;

pub use types::{ActorRole, BookingId, ParseRoleError, UserId};
