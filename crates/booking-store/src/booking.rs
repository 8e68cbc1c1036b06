//! The booking record and its status model.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorRole, BookingId, UserId};

/// Assignment attempts allowed before a booking is auto-cancelled.
pub const DEFAULT_MAX_ASSIGNMENT_ATTEMPTS: u32 = 3;

/// Version number of a stored booking, used for compare-and-swap saves.
///
/// A booking that has never been inserted is at version 0; insertion stores
/// version 1 and every successful save increments by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (0) of a booking that was never stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) written on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The status of a booking in its lifecycle.
///
/// ```text
/// Pending ──► Assigned ──► Accepted ──► InProgress ──► Completed
///    ▲           │            │             │
///    └───────────┘            │             │
///    │                        ▼             ▼
///    └──────(admin)──────  Cancelled ◄──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    /// Waiting for a provider.
    #[default]
    Pending,

    /// A provider has been bound but has not yet accepted.
    Assigned,

    /// The provider accepted the job.
    Accepted,

    /// The provider is performing the service.
    InProgress,

    /// Service finished (terminal state).
    Completed,

    /// Booking was cancelled (terminal state, admin may reopen).
    Cancelled,
}

impl BookingStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Assigned,
        BookingStatus::Accepted,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Returns the status name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Assigned => "assigned",
            BookingStatus::Accepted => "accepted",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status '{0}'. Must be one of: pending, assigned, accepted, in-progress, completed, cancelled")]
pub struct ParseStatusError(pub String);

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// One entry of a booking's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: BookingStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<UserId>,
    pub note: String,
}

/// Scheduling and location details supplied when a booking is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub service_type: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
}

/// A customer's service request tracked through its lifecycle.
///
/// Status only changes through [`Booking::transition`] and
/// [`Booking::cancel`], both of which append to the status history, so the
/// last history entry always matches the current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    id: BookingId,
    customer_id: UserId,
    provider_id: Option<UserId>,
    service_type: String,
    status: BookingStatus,
    scheduled_date: NaiveDate,
    scheduled_time: String,
    address: String,
    description: String,
    assignment_attempts: u32,
    max_assignment_attempts: u32,
    cancelled_by: Option<ActorRole>,
    cancellation_reason: Option<String>,
    status_history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: Version,
}

impl Booking {
    /// Creates a new pending booking with its initial history entry.
    pub fn new(customer_id: UserId, details: BookingDetails, max_assignment_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::new(),
            customer_id,
            provider_id: None,
            service_type: details.service_type,
            status: BookingStatus::Pending,
            scheduled_date: details.scheduled_date,
            scheduled_time: details.scheduled_time,
            address: details.address,
            description: details.description,
            assignment_attempts: 0,
            max_assignment_attempts,
            cancelled_by: None,
            cancellation_reason: None,
            status_history: vec![StatusChange {
                status: BookingStatus::Pending,
                changed_at: now,
                changed_by: None,
                note: "Booking created".to_string(),
            }],
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        }
    }
}

// Query methods
impl Booking {
    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn customer_id(&self) -> &UserId {
        &self.customer_id
    }

    pub fn provider_id(&self) -> Option<&UserId> {
        self.provider_id.as_ref()
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_date
    }

    pub fn scheduled_time(&self) -> &str {
        &self.scheduled_time
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn assignment_attempts(&self) -> u32 {
        self.assignment_attempts
    }

    pub fn max_assignment_attempts(&self) -> u32 {
        self.max_assignment_attempts
    }

    /// Returns true once no further assignment attempt is allowed.
    pub fn attempts_exhausted(&self) -> bool {
        self.assignment_attempts >= self.max_assignment_attempts
    }

    pub fn cancelled_by(&self) -> Option<ActorRole> {
        self.cancelled_by
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    /// Returns the status the booking held before the latest change.
    pub fn previous_status(&self) -> Option<BookingStatus> {
        let len = self.status_history.len();
        len.checked_sub(2)
            .map(|index| self.status_history[index].status)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if `user` is the customer who created the booking.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.customer_id == user
    }

    /// Returns true if `user` is the currently assigned provider.
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.provider_id.as_ref() == Some(user)
    }
}

// Mutation methods
impl Booking {
    /// Moves the booking to `status` and records the change in history.
    pub fn transition(
        &mut self,
        status: BookingStatus,
        changed_by: Option<UserId>,
        note: impl Into<String>,
    ) {
        let now = Utc::now();
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            changed_at: now,
            changed_by,
            note: note.into(),
        });
        self.updated_at = now;
    }

    /// Cancels the booking, recording who cancelled it and why.
    pub fn cancel(
        &mut self,
        cancelled_by: ActorRole,
        reason: impl Into<String>,
        changed_by: Option<UserId>,
        note: impl Into<String>,
    ) {
        self.cancelled_by = Some(cancelled_by);
        self.cancellation_reason = Some(reason.into());
        self.transition(BookingStatus::Cancelled, changed_by, note);
    }

    /// Clears cancellation details when an admin moves a booking out of `cancelled`.
    pub fn clear_cancellation(&mut self) {
        self.cancelled_by = None;
        self.cancellation_reason = None;
    }

    /// Binds a provider to the booking. Does not change the status.
    pub fn set_provider(&mut self, provider_id: UserId) {
        self.provider_id = Some(provider_id);
        self.updated_at = Utc::now();
    }

    /// Removes the bound provider, if any.
    pub fn clear_provider(&mut self) -> Option<UserId> {
        self.updated_at = Utc::now();
        self.provider_id.take()
    }

    /// Counts one execution of the matching algorithm.
    pub fn record_assignment_attempt(&mut self) {
        self.assignment_attempts += 1;
        self.updated_at = Utc::now();
    }

    /// Sets the stored version. Called after a successful insert or save.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
