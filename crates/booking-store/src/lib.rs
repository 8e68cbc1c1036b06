//! Booking records and the append-only event log.
//!
//! This crate owns the data model shared by every lifecycle operation and
//! the persistence contract behind it:
//! - [`Booking`] with its status and append-only status history
//! - [`EventLogEntry`] with the fixed [`EventAction`] vocabulary
//! - [`BookingStore`] and [`EventLog`] traits, with in-memory and PostgreSQL backends

pub mod booking;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use booking::{
    Booking, BookingDetails, BookingStatus, DEFAULT_MAX_ASSIGNMENT_ATTEMPTS, ParseStatusError,
    StatusChange, Version,
};
pub use common::{ActorRole, BookingId, UserId};
pub use error::{Result, StoreError};
pub use event::{EventAction, EventId, EventLogEntry};
pub use memory::{InMemoryBookingStore, InMemoryEventLog};
pub use postgres::{PostgresBookingStore, PostgresEventLog};
pub use query::{BookingOrder, BookingQuery, EventLogQuery};
pub use store::{BookingStore, EventLog, StatusCounts};
