//! Provider assignment engine.
//!
//! Binds an available, qualified provider to a booking, or counts a failed
//! attempt and auto-cancels once the booking's attempt budget is spent.
//! Every call is single-shot: there is no retry loop or timer here, callers
//! decide when to try again.

use booking_store::{
    ActorRole, Booking, BookingId, BookingStatus, BookingStore, EventLog, EventLogEntry, UserId,
};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::directory::{Provider, ProviderDirectory};
use crate::error::{BookingError, Result};
use crate::transitions::record_transition;

/// Cancellation reason recorded when a booking runs out of attempts.
pub const EXHAUSTED_REASON: &str = "No available providers after maximum attempts";

/// What a single assignment attempt achieved.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    /// A provider was bound and the booking is now `assigned`.
    Assigned { provider: Provider },

    /// No provider qualified; the attempt was counted.
    NoAvailableProviders,

    /// The attempt budget is spent and the booking was cancelled.
    MaxAttemptsReached,
}

impl AssignmentOutcome {
    /// Returns true if a provider was bound.
    pub fn is_assigned(&self) -> bool {
        matches!(self, AssignmentOutcome::Assigned { .. })
    }

    /// Returns the machine-readable failure reason, if any.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            AssignmentOutcome::Assigned { .. } => None,
            AssignmentOutcome::NoAvailableProviders => Some("no_available_providers"),
            AssignmentOutcome::MaxAttemptsReached => Some("max_attempts_reached"),
        }
    }

    fn metric_label(&self) -> &'static str {
        self.reason().unwrap_or("assigned")
    }
}

impl Serialize for AssignmentOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AssignmentOutcome", 2)?;
        state.serialize_field("success", &self.is_assigned())?;
        match self {
            AssignmentOutcome::Assigned { provider } => {
                state.serialize_field("provider", provider)?
            }
            _ => state.serialize_field("reason", &self.reason())?,
        }
        state.end()
    }
}

/// The booking as left by an assignment call, with the outcome.
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub booking: Booking,
    pub outcome: AssignmentOutcome,
}

/// Matches bookings to providers.
pub struct AssignmentEngine<S, L, D> {
    store: S,
    log: L,
    directory: D,
}

impl<S, L, D> AssignmentEngine<S, L, D>
where
    S: BookingStore,
    L: EventLog,
    D: ProviderDirectory,
{
    /// Creates an engine over the given store, log and directory.
    pub fn new(store: S, log: L, directory: D) -> Self {
        Self {
            store,
            log,
            directory,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Loads a booking and runs one assignment attempt on it.
    ///
    /// `excluded` applies to this attempt only.
    #[tracing::instrument(skip(self))]
    pub async fn attempt_assignment(
        &self,
        booking_id: BookingId,
        excluded: &[UserId],
    ) -> Result<AssignmentResult> {
        let booking = self.load(booking_id).await?;
        self.assign(booking, excluded).await
    }

    /// Runs one assignment attempt on an already loaded booking.
    ///
    /// The booking must be at its stored version; a stale copy fails with a
    /// concurrency conflict and nothing is written.
    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id()))]
    pub async fn assign(&self, mut booking: Booking, excluded: &[UserId]) -> Result<AssignmentResult> {
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                "assign a provider to",
                booking.status(),
                &[BookingStatus::Pending],
            ));
        }

        if booking.attempts_exhausted() {
            return self.auto_cancel(booking).await;
        }

        let provider = self
            .directory
            .find_available(booking.service_type(), excluded)
            .await?;

        let Some(provider) = provider else {
            booking.record_assignment_attempt();
            if booking.attempts_exhausted() {
                return self.auto_cancel(booking).await;
            }

            let version = self.store.save(&booking).await?;
            booking.set_version(version);

            tracing::info!(
                attempts = booking.assignment_attempts(),
                max = booking.max_assignment_attempts(),
                "No available provider"
            );
            return Ok(self.finish(booking, AssignmentOutcome::NoAvailableProviders));
        };

        booking.record_assignment_attempt();
        booking.set_provider(provider.id.clone());
        booking.transition(
            BookingStatus::Assigned,
            None,
            format!("Assigned to provider: {}", provider.name),
        );
        let version = self.store.save(&booking).await?;
        booking.set_version(version);

        self.log
            .append(EventLogEntry::provider_assigned(
                booking.id(),
                &provider.id,
                &provider.name,
                booking.assignment_attempts(),
            ))
            .await?;

        tracing::info!(
            provider_id = %provider.id,
            attempt = booking.assignment_attempts(),
            "Provider assigned"
        );
        record_transition(BookingStatus::Assigned);

        Ok(self.finish(booking, AssignmentOutcome::Assigned { provider }))
    }

    /// Loads a booking, releases the rejecting provider, and tries to
    /// reassign it to someone else.
    #[tracing::instrument(skip(self))]
    pub async fn handle_provider_rejection(
        &self,
        booking_id: BookingId,
        provider_id: UserId,
        reason: Option<&str>,
    ) -> Result<AssignmentResult> {
        let booking = self.load(booking_id).await?;
        self.reassign_after_rejection(booking, provider_id, reason).await
    }

    /// Puts a loaded booking back to `pending` after a rejection, logs it,
    /// and runs one assignment attempt that skips the rejecting provider.
    ///
    /// Only this next attempt skips them. Later attempts may offer the
    /// booking to the same provider again.
    #[tracing::instrument(skip(self, booking), fields(booking_id = %booking.id()))]
    pub async fn reassign_after_rejection(
        &self,
        mut booking: Booking,
        provider_id: UserId,
        reason: Option<&str>,
    ) -> Result<AssignmentResult> {
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                "reject",
                booking.status(),
                &[BookingStatus::Assigned],
            ));
        }

        booking.clear_provider();
        booking.transition(
            BookingStatus::Pending,
            Some(provider_id.clone()),
            format!("Provider rejected: {}", reason.unwrap_or("No reason provided")),
        );
        let version = self.store.save(&booking).await?;
        booking.set_version(version);

        self.log
            .append(EventLogEntry::provider_rejected(
                booking.id(),
                provider_id.clone(),
                reason,
            ))
            .await?;

        tracing::info!(%provider_id, "Provider rejected booking");
        record_transition(BookingStatus::Pending);

        self.assign(booking, std::slice::from_ref(&provider_id)).await
    }

    async fn auto_cancel(&self, mut booking: Booking) -> Result<AssignmentResult> {
        let note = format!(
            "Auto-cancelled: max {} assignment attempts reached",
            booking.max_assignment_attempts()
        );
        booking.clear_provider();
        booking.cancel(ActorRole::System, EXHAUSTED_REASON, None, note);
        let version = self.store.save(&booking).await?;
        booking.set_version(version);

        self.log
            .append(EventLogEntry::auto_cancelled(
                booking.id(),
                booking.assignment_attempts(),
            ))
            .await?;

        tracing::warn!(
            attempts = booking.assignment_attempts(),
            "Booking auto-cancelled, assignment attempts exhausted"
        );
        metrics::counter!("bookings_auto_cancelled_total").increment(1);
        record_transition(BookingStatus::Cancelled);

        Ok(self.finish(booking, AssignmentOutcome::MaxAttemptsReached))
    }

    fn finish(&self, booking: Booking, outcome: AssignmentOutcome) -> AssignmentResult {
        metrics::counter!(
            "booking_assignment_attempts_total",
            "outcome" => outcome.metric_label()
        )
        .increment(1);
        AssignmentResult { booking, outcome }
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .get(booking_id)
            .await?
            .ok_or_else(BookingError::booking_not_found)
    }
}

#[cfg(test)]
mod tests {
    use booking_store::{
        BookingDetails, EventAction, EventLogQuery, InMemoryBookingStore, InMemoryEventLog,
    };
    use chrono::NaiveDate;

    use super::*;
    use crate::directory::InMemoryProviderDirectory;

    type Engine = AssignmentEngine<InMemoryBookingStore, InMemoryEventLog, InMemoryProviderDirectory>;

    fn create_engine() -> Engine {
        AssignmentEngine::new(
            InMemoryBookingStore::new(),
            InMemoryEventLog::new(),
            InMemoryProviderDirectory::demo(),
        )
    }

    async fn stored_booking(engine: &Engine, service_type: &str, max_attempts: u32) -> Booking {
        let mut booking = Booking::new(
            UserId::new("customer1"),
            BookingDetails {
                service_type: service_type.to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
                scheduled_time: "10:00".to_string(),
                address: "1 High Street".to_string(),
                description: String::new(),
            },
            max_attempts,
        );
        let version = engine.store().insert(&booking).await.unwrap();
        booking.set_version(version);
        booking
    }

    #[tokio::test]
    async fn test_assigns_first_available_provider() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "pipe-repair", 3).await;

        let result = engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        assert!(result.outcome.is_assigned());
        assert_eq!(result.booking.status(), BookingStatus::Assigned);
        assert_eq!(result.booking.provider_id(), Some(&UserId::new("provider2")));
        assert_eq!(result.booking.assignment_attempts(), 1);
        let last = result.booking.status_history().last().unwrap();
        assert_eq!(last.note, "Assigned to provider: Sam Plumber");
        assert!(last.changed_by.is_none());

        let events = engine.log().query(EventLogQuery::new()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, EventAction::ProviderAssigned);
        assert_eq!(events[0].details["attempt"], 1);
    }

    #[tokio::test]
    async fn test_no_provider_counts_attempt_and_keeps_status() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "roof-repair", 3).await;

        let result = engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        assert_eq!(result.outcome, AssignmentOutcome::NoAvailableProviders);
        let stored = engine.store().get(booking.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), BookingStatus::Pending);
        assert_eq!(stored.assignment_attempts(), 1);
        assert_eq!(stored.status_history().len(), 1);
        assert_eq!(engine.log().entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_last_failed_attempt_auto_cancels() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "roof-repair", 1).await;

        let result = engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        assert_eq!(result.outcome, AssignmentOutcome::MaxAttemptsReached);
        assert_eq!(result.booking.status(), BookingStatus::Cancelled);
        assert_eq!(result.booking.cancelled_by(), Some(ActorRole::System));
        assert_eq!(result.booking.cancellation_reason(), Some(EXHAUSTED_REASON));
        assert_eq!(result.booking.assignment_attempts(), 1);
        assert_eq!(
            result.booking.status_history().last().unwrap().note,
            "Auto-cancelled: max 1 assignment attempts reached"
        );

        let events = engine.log().query(EventLogQuery::new()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, EventAction::AutoCancelled);
        assert_eq!(events[0].details["attempts"], 1);
    }

    #[tokio::test]
    async fn test_exhausted_booking_is_cancelled_without_searching() {
        let engine = create_engine();
        let mut booking = stored_booking(&engine, "window-wash", 2).await;
        booking.record_assignment_attempt();
        booking.record_assignment_attempt();
        engine.store().save(&booking).await.unwrap();

        let result = engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        assert_eq!(result.outcome, AssignmentOutcome::MaxAttemptsReached);
        assert!(result.booking.provider_id().is_none());
        assert_eq!(result.booking.assignment_attempts(), 2);
    }

    #[tokio::test]
    async fn test_terminal_booking_is_rejected() {
        let engine = create_engine();
        let mut booking = stored_booking(&engine, "window-wash", 3).await;
        booking.cancel(ActorRole::Customer, "Changed plans", None, "Changed plans");
        engine.store().save(&booking).await.unwrap();

        let result = engine.attempt_assignment(booking.id(), &[]).await;
        assert!(matches!(
            result,
            Err(BookingError::InvalidState {
                current: BookingStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_booking_is_not_found() {
        let engine = create_engine();
        let result = engine.attempt_assignment(BookingId::new(), &[]).await;
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejection_excludes_rejecting_provider_once() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "sofa-cleaning", 5).await;
        let first = engine.attempt_assignment(booking.id(), &[]).await.unwrap();
        assert_eq!(first.booking.provider_id(), Some(&UserId::new("provider1")));

        let second = engine
            .handle_provider_rejection(booking.id(), UserId::new("provider1"), Some("too far"))
            .await
            .unwrap();
        assert_eq!(second.booking.provider_id(), Some(&UserId::new("provider4")));

        // The exclusion list does not accumulate: Sarah's rejection hands
        // the booking straight back to Mike.
        let third = engine
            .handle_provider_rejection(booking.id(), UserId::new("provider4"), None)
            .await
            .unwrap();
        assert_eq!(third.booking.provider_id(), Some(&UserId::new("provider1")));
        assert_eq!(third.booking.assignment_attempts(), 3);

        let notes: Vec<_> = third
            .booking
            .status_history()
            .iter()
            .map(|h| h.note.as_str())
            .collect();
        assert!(notes.contains(&"Provider rejected: too far"));
        assert!(notes.contains(&"Provider rejected: No reason provided"));
    }

    #[tokio::test]
    async fn test_rejection_with_no_alternative_leaves_booking_pending() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "pipe-repair", 3).await;
        engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        let result = engine
            .handle_provider_rejection(booking.id(), UserId::new("provider2"), Some("busy"))
            .await
            .unwrap();

        assert_eq!(result.outcome, AssignmentOutcome::NoAvailableProviders);
        assert_eq!(result.booking.status(), BookingStatus::Pending);
        assert!(result.booking.provider_id().is_none());
        assert_eq!(result.booking.assignment_attempts(), 2);

        let events = engine
            .log()
            .query(EventLogQuery::for_booking(booking.id()))
            .await
            .unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![EventAction::ProviderRejected, EventAction::ProviderAssigned]
        );
    }

    #[tokio::test]
    async fn test_rejection_never_reopens_finished_booking() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "sofa-cleaning", 3).await;
        let assigned = engine.attempt_assignment(booking.id(), &[]).await.unwrap();
        let mut completed = assigned.booking;
        completed.transition(BookingStatus::Accepted, None, "Accepted");
        completed.transition(BookingStatus::InProgress, None, "Started");
        completed.transition(BookingStatus::Completed, None, "Done");
        engine.store().save(&completed).await.unwrap();

        let result = engine
            .handle_provider_rejection(booking.id(), UserId::new("provider1"), None)
            .await;
        assert!(matches!(
            result,
            Err(BookingError::InvalidState {
                current: BookingStatus::Completed,
                ..
            })
        ));

        let stored = engine.store().get(booking.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), BookingStatus::Completed);
        assert_eq!(stored.provider_id(), Some(&UserId::new("provider1")));
        assert_eq!(stored.assignment_attempts(), 1);
        let actions: Vec<_> = engine
            .log()
            .query(EventLogQuery::for_booking(booking.id()))
            .await
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![EventAction::ProviderAssigned]);
    }

    #[tokio::test]
    async fn test_rejection_on_cancelled_booking_is_invalid() {
        let engine = create_engine();
        let mut booking = stored_booking(&engine, "window-wash", 3).await;
        booking.cancel(ActorRole::Customer, "Changed plans", None, "Changed plans");
        let version = engine.store().save(&booking).await.unwrap();
        booking.set_version(version);

        let result = engine
            .reassign_after_rejection(booking.clone(), UserId::new("provider4"), Some("busy"))
            .await;
        assert!(matches!(
            result,
            Err(BookingError::InvalidState {
                current: BookingStatus::Cancelled,
                ..
            })
        ));
        let stored = engine.store().get(booking.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), BookingStatus::Cancelled);
        assert_eq!(stored.version(), booking.version());
    }

    #[tokio::test]
    async fn test_stale_booking_copy_is_a_conflict() {
        let engine = create_engine();
        let booking = stored_booking(&engine, "pipe-repair", 3).await;
        let stale = booking.clone();
        engine.attempt_assignment(booking.id(), &[]).await.unwrap();

        let result = engine.assign(stale, &[]).await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(AssignmentOutcome::NoAvailableProviders).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "reason": "no_available_providers" })
        );

        let json = serde_json::to_value(AssignmentOutcome::MaxAttemptsReached).unwrap();
        assert_eq!(json["reason"], "max_attempts_reached");
    }
}
