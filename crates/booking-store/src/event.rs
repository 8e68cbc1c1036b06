//! Event log entries.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{ActorRole, BookingId, BookingStatus, UserId};

/// Unique identifier for an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed vocabulary of actions recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    BookingCreated,
    ProviderAssigned,
    ProviderRejected,
    AutoCancelled,
    BookingAccepted,
    ServiceStarted,
    ServiceCompleted,
    BookingCancelled,
    StatusOverride,
    ManualAssignment,
    NoShow,
}

impl EventAction {
    pub const ALL: [EventAction; 11] = [
        EventAction::BookingCreated,
        EventAction::ProviderAssigned,
        EventAction::ProviderRejected,
        EventAction::AutoCancelled,
        EventAction::BookingAccepted,
        EventAction::ServiceStarted,
        EventAction::ServiceCompleted,
        EventAction::BookingCancelled,
        EventAction::StatusOverride,
        EventAction::ManualAssignment,
        EventAction::NoShow,
    ];

    /// Returns the action tag as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::BookingCreated => "BOOKING_CREATED",
            EventAction::ProviderAssigned => "PROVIDER_ASSIGNED",
            EventAction::ProviderRejected => "PROVIDER_REJECTED",
            EventAction::AutoCancelled => "AUTO_CANCELLED",
            EventAction::BookingAccepted => "BOOKING_ACCEPTED",
            EventAction::ServiceStarted => "SERVICE_STARTED",
            EventAction::ServiceCompleted => "SERVICE_COMPLETED",
            EventAction::BookingCancelled => "BOOKING_CANCELLED",
            EventAction::StatusOverride => "STATUS_OVERRIDE",
            EventAction::ManualAssignment => "MANUAL_ASSIGNMENT",
            EventAction::NoShow => "NO_SHOW",
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown event action: {s}"))
    }
}

/// An immutable audit record of one domain action on a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    /// Unique identifier for this entry.
    pub event_id: EventId,

    /// The booking this entry refers to.
    pub booking_id: BookingId,

    /// What happened.
    pub action: EventAction,

    /// Who did it, when a concrete user was involved.
    pub performed_by: Option<UserId>,

    /// The role of the actor.
    pub performed_by_role: ActorRole,

    /// Free-form key/value payload.
    pub details: serde_json::Value,

    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    /// Creates an entry with an arbitrary payload.
    pub fn new(
        booking_id: BookingId,
        action: EventAction,
        performed_by: Option<UserId>,
        performed_by_role: ActorRole,
        details: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            booking_id,
            action,
            performed_by,
            performed_by_role,
            details,
            timestamp: Utc::now(),
        }
    }

    /// Returns a detail value by key.
    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.get(key)
    }
}

// Convenience constructors for each action
impl EventLogEntry {
    pub fn booking_created(
        booking_id: BookingId,
        customer_id: UserId,
        service_type: &str,
        scheduled_date: NaiveDate,
        address: &str,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::BookingCreated,
            Some(customer_id),
            ActorRole::Customer,
            json!({
                "serviceType": service_type,
                "scheduledDate": scheduled_date,
                "address": address,
            }),
        )
    }

    pub fn provider_assigned(
        booking_id: BookingId,
        provider_id: &UserId,
        provider_name: &str,
        attempt: u32,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::ProviderAssigned,
            None,
            ActorRole::System,
            json!({
                "providerId": provider_id,
                "providerName": provider_name,
                "attempt": attempt,
            }),
        )
    }

    pub fn provider_rejected(
        booking_id: BookingId,
        provider_id: UserId,
        reason: Option<&str>,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::ProviderRejected,
            Some(provider_id),
            ActorRole::Provider,
            json!({ "reason": reason }),
        )
    }

    pub fn auto_cancelled(booking_id: BookingId, attempts: u32) -> Self {
        Self::new(
            booking_id,
            EventAction::AutoCancelled,
            None,
            ActorRole::System,
            json!({
                "reason": "max_assignment_attempts",
                "attempts": attempts,
            }),
        )
    }

    pub fn booking_accepted(
        booking_id: BookingId,
        provider_id: UserId,
        provider_name: Option<&str>,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::BookingAccepted,
            Some(provider_id),
            ActorRole::Provider,
            json!({ "providerName": provider_name }),
        )
    }

    pub fn service_started(booking_id: BookingId, provider_id: UserId) -> Self {
        Self::new(
            booking_id,
            EventAction::ServiceStarted,
            Some(provider_id),
            ActorRole::Provider,
            json!({}),
        )
    }

    pub fn service_completed(
        booking_id: BookingId,
        provider_id: UserId,
        notes: Option<&str>,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::ServiceCompleted,
            Some(provider_id),
            ActorRole::Provider,
            json!({ "notes": notes }),
        )
    }

    pub fn booking_cancelled(
        booking_id: BookingId,
        actor_id: UserId,
        actor_role: ActorRole,
        reason: &str,
        previous_status: BookingStatus,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::BookingCancelled,
            Some(actor_id),
            actor_role,
            json!({
                "reason": reason,
                "previousStatus": previous_status,
            }),
        )
    }

    pub fn status_override(
        booking_id: BookingId,
        admin_id: UserId,
        old_status: BookingStatus,
        new_status: BookingStatus,
        reason: Option<&str>,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::StatusOverride,
            Some(admin_id),
            ActorRole::Admin,
            json!({
                "oldStatus": old_status,
                "newStatus": new_status,
                "reason": reason,
            }),
        )
    }

    pub fn manual_assignment(
        booking_id: BookingId,
        admin_id: UserId,
        old_provider: Option<&UserId>,
        new_provider: &UserId,
        provider_name: &str,
    ) -> Self {
        Self::new(
            booking_id,
            EventAction::ManualAssignment,
            Some(admin_id),
            ActorRole::Admin,
            json!({
                "oldProvider": old_provider,
                "newProvider": new_provider,
                "providerName": provider_name,
            }),
        )
    }

    pub fn no_show(booking_id: BookingId, admin_id: UserId, no_show_type: &str) -> Self {
        Self::new(
            booking_id,
            EventAction::NoShow,
            Some(admin_id),
            ActorRole::Admin,
            json!({ "type": no_show_type }),
        )
    }
}
