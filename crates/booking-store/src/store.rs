use async_trait::async_trait;
use serde::Serialize;

use crate::{
    Booking, BookingId, BookingQuery, BookingStatus, EventLogEntry, EventLogQuery, Result, Version,
};

/// Persistence contract for bookings.
///
/// Every write is a compare-and-swap on [`Booking::version`]: a save only
/// succeeds if the stored version still equals the version the caller
/// loaded, so two concurrent read-modify-write cycles on one booking can
/// never silently overwrite each other. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Stores a booking that has never been stored before.
    ///
    /// Fails with `DuplicateBooking` if the ID is already taken.
    /// Returns the stored version ([`Version::first`]).
    async fn insert(&self, booking: &Booking) -> Result<Version>;

    /// Loads a booking by ID.
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Writes back a modified booking.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version differs from
    /// `booking.version()`, and with `BookingNotFound` if it was never stored.
    /// Returns the new version.
    async fn save(&self, booking: &Booking) -> Result<Version>;

    /// Lists bookings matching a query.
    async fn find(&self, query: BookingQuery) -> Result<Vec<Booking>>;

    /// Counts bookings per status.
    async fn count_by_status(&self) -> Result<StatusCounts>;
}

/// Append-only event log.
///
/// Entries are never updated or deleted once appended.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an entry.
    async fn append(&self, entry: EventLogEntry) -> Result<()>;

    /// Reads entries matching a query, newest first.
    async fn query(&self, query: EventLogQuery) -> Result<Vec<EventLogEntry>>;
}

/// Booking counts per status, as shown on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub assigned: u64,
    pub accepted: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    /// Adds `count` bookings in `status`.
    pub fn add(&mut self, status: BookingStatus, count: u64) {
        self.total += count;
        let slot = match status {
            BookingStatus::Pending => &mut self.pending,
            BookingStatus::Assigned => &mut self.assigned,
            BookingStatus::Accepted => &mut self.accepted,
            BookingStatus::InProgress => &mut self.in_progress,
            BookingStatus::Completed => &mut self.completed,
            BookingStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }
}
