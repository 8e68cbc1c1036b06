//! Booking lifecycle service.
//!
//! Validates each customer, provider and admin action against the booking's
//! current state, applies it with a compare-and-swap save, writes the audit
//! entry, and hands creation and rejection over to the assignment engine.

use booking_store::{
    ActorRole, Booking, BookingId, BookingQuery, BookingStatus, BookingStore, EventLog,
    EventLogEntry, EventLogQuery, StatusChange, StatusCounts, UserId,
    DEFAULT_MAX_ASSIGNMENT_ATTEMPTS,
};
use serde::Serialize;

use crate::assignment::{AssignmentEngine, AssignmentOutcome};
use crate::commands::{Actor, CreateBooking, NoShowType};
use crate::directory::{Provider, ProviderDirectory};
use crate::error::{BookingError, Result};
use crate::transitions::{is_valid_transition, record_transition, sources_for};

/// The booking after a successful operation, with a message for the caller.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub booking: Booking,
    pub message: String,

    /// Set by operations that ran an assignment attempt.
    pub assignment: Option<AssignmentOutcome>,
}

impl CommandResult {
    fn new(booking: Booking, message: impl Into<String>) -> Self {
        Self {
            booking,
            message: message.into(),
            assignment: None,
        }
    }
}

/// A booking's own status history alongside its event log entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistory {
    pub status_history: Vec<StatusChange>,

    /// Newest first.
    pub events: Vec<EventLogEntry>,
}

/// Service for managing bookings.
pub struct BookingService<S, L, D> {
    engine: AssignmentEngine<S, L, D>,
    max_assignment_attempts: u32,
}

impl<S, L, D> BookingService<S, L, D>
where
    S: BookingStore,
    L: EventLog,
    D: ProviderDirectory,
{
    /// Creates a service with the default attempt budget.
    pub fn new(store: S, log: L, directory: D) -> Self {
        Self {
            engine: AssignmentEngine::new(store, log, directory),
            max_assignment_attempts: DEFAULT_MAX_ASSIGNMENT_ATTEMPTS,
        }
    }

    /// Sets the attempt budget given to newly created bookings.
    pub fn with_max_assignment_attempts(mut self, max: u32) -> Self {
        self.max_assignment_attempts = max.max(1);
        self
    }

    pub fn engine(&self) -> &AssignmentEngine<S, L, D> {
        &self.engine
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    pub fn log(&self) -> &L {
        self.engine.log()
    }

    pub fn directory(&self) -> &D {
        self.engine.directory()
    }

    // Customer operations

    /// Creates a booking and immediately tries to assign a provider.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, customer_id: UserId, cmd: CreateBooking) -> Result<CommandResult> {
        let details = cmd.validate()?;
        let mut booking = Booking::new(customer_id.clone(), details, self.max_assignment_attempts);

        let version = self.store().insert(&booking).await?;
        booking.set_version(version);

        self.log()
            .append(EventLogEntry::booking_created(
                booking.id(),
                customer_id,
                booking.service_type(),
                booking.scheduled_date(),
                booking.address(),
            ))
            .await?;

        tracing::info!(booking_id = %booking.id(), service_type = booking.service_type(), "Booking created");
        metrics::counter!("bookings_created_total").increment(1);

        let assignment = self.engine.assign(booking, &[]).await?;
        let message = match assignment.outcome {
            AssignmentOutcome::Assigned { .. } => "Booking created and provider assigned",
            AssignmentOutcome::NoAvailableProviders => {
                "Booking created, waiting for provider assignment"
            }
            AssignmentOutcome::MaxAttemptsReached => {
                "Booking created, but cancelled due to no available providers"
            }
        };

        Ok(CommandResult {
            booking: assignment.booking,
            message: message.to_string(),
            assignment: Some(assignment.outcome),
        })
    }

    /// Cancels a booking on behalf of its customer, its provider or an admin.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        booking_id: BookingId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<CommandResult> {
        let mut booking = self.load(booking_id).await?;

        let default_reason = match actor.role {
            ActorRole::Customer => {
                if !booking.is_owned_by(&actor.id) {
                    return Err(BookingError::Forbidden(
                        "Not authorized to cancel this booking".to_string(),
                    ));
                }
                "Cancelled by customer"
            }
            ActorRole::Provider => {
                if !booking.is_assigned_to(&actor.id) {
                    return Err(not_assigned());
                }
                "Cancelled by provider"
            }
            ActorRole::Admin => "Cancelled by admin",
            ActorRole::System => {
                return Err(BookingError::Forbidden(
                    "System actors cannot cancel bookings directly".to_string(),
                ));
            }
        };

        let previous = booking.status();
        if !is_valid_transition(previous, BookingStatus::Cancelled, actor.role) {
            return Err(BookingError::invalid_state(
                "cancel",
                previous,
                &sources_for(BookingStatus::Cancelled, actor.role),
            ));
        }

        let reason = non_empty(reason).unwrap_or_else(|| default_reason.to_string());
        booking.cancel(actor.role, reason.clone(), Some(actor.id.clone()), reason.clone());
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::booking_cancelled(
                booking.id(),
                actor.id.clone(),
                actor.role,
                &reason,
                previous,
            ))
            .await?;

        tracing::info!(role = %actor.role, %previous, "Booking cancelled");
        record_transition(BookingStatus::Cancelled);

        Ok(CommandResult::new(booking, "Booking cancelled successfully"))
    }

    // Provider operations

    /// Accepts an assigned booking.
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, booking_id: BookingId, provider_id: &UserId) -> Result<CommandResult> {
        let mut booking = self
            .load_for_provider(booking_id, provider_id, "accept", BookingStatus::Assigned)
            .await?;

        booking.transition(
            BookingStatus::Accepted,
            Some(provider_id.clone()),
            "Provider accepted the booking",
        );
        self.save(&mut booking).await?;

        let provider_name = self.provider_name(provider_id).await?;
        self.log()
            .append(EventLogEntry::booking_accepted(
                booking.id(),
                provider_id.clone(),
                provider_name.as_deref(),
            ))
            .await?;

        tracing::info!("Booking accepted");
        record_transition(BookingStatus::Accepted);

        Ok(CommandResult::new(booking, "Booking accepted successfully"))
    }

    /// Rejects an assigned booking and tries to hand it to another provider.
    #[tracing::instrument(skip(self))]
    pub async fn reject(
        &self,
        booking_id: BookingId,
        provider_id: &UserId,
        reason: Option<String>,
    ) -> Result<CommandResult> {
        let booking = self
            .load_for_provider(booking_id, provider_id, "reject", BookingStatus::Assigned)
            .await?;

        let reason = non_empty(reason);
        let result = self
            .engine
            .reassign_after_rejection(booking, provider_id.clone(), reason.as_deref())
            .await?;

        let message = match result.outcome {
            AssignmentOutcome::Assigned { .. } => {
                "Booking rejected and reassigned to another provider"
            }
            AssignmentOutcome::NoAvailableProviders => {
                "Booking rejected. Waiting for next available provider"
            }
            AssignmentOutcome::MaxAttemptsReached => {
                "Booking rejected. Booking cancelled due to no available providers"
            }
        };

        Ok(CommandResult {
            booking: result.booking,
            message: message.to_string(),
            assignment: Some(result.outcome),
        })
    }

    /// Starts work on an accepted booking.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, booking_id: BookingId, provider_id: &UserId) -> Result<CommandResult> {
        let mut booking = self
            .load_for_provider(booking_id, provider_id, "start", BookingStatus::Accepted)
            .await?;

        booking.transition(
            BookingStatus::InProgress,
            Some(provider_id.clone()),
            "Service started",
        );
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::service_started(
                booking.id(),
                provider_id.clone(),
            ))
            .await?;

        tracing::info!("Service started");
        record_transition(BookingStatus::InProgress);

        Ok(CommandResult::new(booking, "Service started"))
    }

    /// Completes an in-progress booking.
    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        booking_id: BookingId,
        provider_id: &UserId,
        notes: Option<String>,
    ) -> Result<CommandResult> {
        let mut booking = self
            .load_for_provider(booking_id, provider_id, "complete", BookingStatus::InProgress)
            .await?;

        let notes = non_empty(notes);
        booking.transition(
            BookingStatus::Completed,
            Some(provider_id.clone()),
            notes
                .clone()
                .unwrap_or_else(|| "Service completed successfully".to_string()),
        );
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::service_completed(
                booking.id(),
                provider_id.clone(),
                notes.as_deref(),
            ))
            .await?;

        tracing::info!("Service completed");
        record_transition(BookingStatus::Completed);

        Ok(CommandResult::new(booking, "Service completed successfully"))
    }

    // Admin operations

    /// Sets a booking's status unconditionally.
    ///
    /// Bypasses the transition table, including out of terminal states.
    #[tracing::instrument(skip(self))]
    pub async fn admin_override_status(
        &self,
        booking_id: BookingId,
        new_status: BookingStatus,
        reason: Option<String>,
        admin_id: &UserId,
    ) -> Result<CommandResult> {
        let mut booking = self.load(booking_id).await?;
        let old_status = booking.status();
        let reason = non_empty(reason);
        let note = format!(
            "Admin override: {}",
            reason.as_deref().unwrap_or("No reason provided")
        );

        if new_status == BookingStatus::Cancelled {
            let cancellation = reason
                .clone()
                .unwrap_or_else(|| "Cancelled by admin".to_string());
            booking.cancel(ActorRole::Admin, cancellation, Some(admin_id.clone()), note);
        } else {
            if old_status == BookingStatus::Cancelled {
                booking.clear_cancellation();
            }
            booking.transition(new_status, Some(admin_id.clone()), note);
        }
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::status_override(
                booking.id(),
                admin_id.clone(),
                old_status,
                new_status,
                reason.as_deref(),
            ))
            .await?;

        tracing::info!(%old_status, %new_status, "Status overridden by admin");
        record_transition(new_status);

        Ok(CommandResult::new(
            booking,
            format!("Status changed from {old_status} to {new_status}"),
        ))
    }

    /// Binds a chosen provider to a pending or assigned booking.
    ///
    /// Does not count as an assignment attempt.
    #[tracing::instrument(skip(self))]
    pub async fn admin_assign_provider(
        &self,
        booking_id: BookingId,
        provider_id: &UserId,
        admin_id: &UserId,
    ) -> Result<CommandResult> {
        let provider = self
            .directory()
            .get(provider_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Provider not found: {provider_id}")))?;

        let mut booking = self.load(booking_id).await?;
        const ASSIGNABLE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Assigned];
        if !ASSIGNABLE.contains(&booking.status()) {
            return Err(BookingError::invalid_state(
                "assign a provider to",
                booking.status(),
                &ASSIGNABLE,
            ));
        }

        let old_provider = booking.provider_id().cloned();
        booking.set_provider(provider.id.clone());
        booking.transition(
            BookingStatus::Assigned,
            Some(admin_id.clone()),
            format!("Admin assigned provider: {}", provider.name),
        );
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::manual_assignment(
                booking.id(),
                admin_id.clone(),
                old_provider.as_ref(),
                &provider.id,
                &provider.name,
            ))
            .await?;

        tracing::info!(provider_id = %provider.id, "Provider assigned by admin");
        record_transition(BookingStatus::Assigned);

        Ok(CommandResult::new(
            booking,
            format!("Provider {} assigned successfully", provider.name),
        ))
    }

    /// Cancels an assigned or accepted booking because one party did not show up.
    #[tracing::instrument(skip(self))]
    pub async fn admin_mark_no_show(
        &self,
        booking_id: BookingId,
        no_show_type: NoShowType,
        admin_id: &UserId,
    ) -> Result<CommandResult> {
        let mut booking = self.load(booking_id).await?;
        const NO_SHOW_FROM: [BookingStatus; 2] = [BookingStatus::Assigned, BookingStatus::Accepted];
        if !NO_SHOW_FROM.contains(&booking.status()) {
            return Err(BookingError::invalid_state(
                "mark no-show for",
                booking.status(),
                &NO_SHOW_FROM,
            ));
        }

        booking.cancel(
            ActorRole::System,
            format!("{no_show_type} no-show"),
            Some(admin_id.clone()),
            format!("No-show: {no_show_type}"),
        );
        self.save(&mut booking).await?;

        self.log()
            .append(EventLogEntry::no_show(
                booking.id(),
                admin_id.clone(),
                no_show_type.as_str(),
            ))
            .await?;

        tracing::info!(%no_show_type, "Booking marked as no-show");
        record_transition(BookingStatus::Cancelled);

        Ok(CommandResult::new(
            booking,
            "Booking marked as no-show and cancelled",
        ))
    }

    // Queries

    /// Loads a booking the actor is allowed to see.
    #[tracing::instrument(skip(self))]
    pub async fn get_booking(&self, booking_id: BookingId, actor: &Actor) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        let allowed = match actor.role {
            ActorRole::Customer => booking.is_owned_by(&actor.id),
            ActorRole::Provider => booking.is_assigned_to(&actor.id),
            ActorRole::Admin | ActorRole::System => true,
        };
        if !allowed {
            return Err(BookingError::Forbidden(
                "Not authorized to view this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    /// Lists a customer's bookings, newest first.
    pub async fn customer_bookings(
        &self,
        customer_id: &UserId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>> {
        let query = BookingQuery::for_customer(customer_id.clone()).maybe_status(status);
        Ok(self.store().find(query).await?)
    }

    /// Lists a provider's bookings, earliest scheduled first.
    pub async fn provider_bookings(
        &self,
        provider_id: &UserId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>> {
        let query = BookingQuery::for_provider(provider_id.clone()).maybe_status(status);
        Ok(self.store().find(query).await?)
    }

    /// Lists bookings matching an arbitrary query.
    pub async fn all_bookings(&self, query: BookingQuery) -> Result<Vec<Booking>> {
        Ok(self.store().find(query).await?)
    }

    /// Returns a booking's status history and its event log entries.
    #[tracing::instrument(skip(self))]
    pub async fn booking_history(
        &self,
        booking_id: BookingId,
        actor: &Actor,
    ) -> Result<BookingHistory> {
        let booking = self.get_booking(booking_id, actor).await?;
        let events = self
            .log()
            .query(EventLogQuery::for_booking(booking_id))
            .await?;

        Ok(BookingHistory {
            status_history: booking.status_history().to_vec(),
            events,
        })
    }

    /// Reads the event log, newest first.
    pub async fn event_logs(&self, query: EventLogQuery) -> Result<Vec<EventLogEntry>> {
        Ok(self.log().query(query).await?)
    }

    /// Counts bookings per status.
    pub async fn dashboard_stats(&self) -> Result<StatusCounts> {
        Ok(self.store().count_by_status().await?)
    }

    /// Lists providers, optionally only those offering `service_type`.
    pub async fn list_providers(&self, service_type: Option<&str>) -> Result<Vec<Provider>> {
        self.directory().list(service_type).await
    }

    // Helpers

    async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.store()
            .get(booking_id)
            .await?
            .ok_or_else(BookingError::booking_not_found)
    }

    async fn load_for_provider(
        &self,
        booking_id: BookingId,
        provider_id: &UserId,
        action: &'static str,
        required: BookingStatus,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.is_assigned_to(provider_id) {
            return Err(not_assigned());
        }
        if booking.status() != required {
            return Err(BookingError::invalid_state(action, booking.status(), &[required]));
        }
        Ok(booking)
    }

    async fn save(&self, booking: &mut Booking) -> Result<()> {
        let version = self.store().save(booking).await?;
        booking.set_version(version);
        Ok(())
    }

    async fn provider_name(&self, provider_id: &UserId) -> Result<Option<String>> {
        Ok(self.directory().get(provider_id).await?.map(|p| p.name))
    }
}

fn not_assigned() -> BookingError {
    BookingError::Forbidden("This booking is not assigned to you".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use booking_store::{EventAction, InMemoryBookingStore, InMemoryEventLog};

    use super::*;
    use crate::directory::InMemoryProviderDirectory;

    type Service = BookingService<InMemoryBookingStore, InMemoryEventLog, InMemoryProviderDirectory>;

    fn create_service() -> Service {
        BookingService::new(
            InMemoryBookingStore::new(),
            InMemoryEventLog::new(),
            InMemoryProviderDirectory::demo(),
        )
    }

    fn window_wash() -> CreateBooking {
        CreateBooking::new("window-wash", "2025-04-02", "11:00", "9 Quay Street")
    }

    #[tokio::test]
    async fn test_create_assigns_and_logs() {
        let service = create_service();
        let result = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();

        assert_eq!(result.message, "Booking created and provider assigned");
        assert_eq!(result.booking.status(), BookingStatus::Assigned);
        assert!(result.assignment.unwrap().is_assigned());

        let events = service
            .event_logs(EventLogQuery::for_booking(result.booking.id()))
            .await
            .unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![EventAction::ProviderAssigned, EventAction::BookingCreated]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields() {
        let service = create_service();
        let result = service
            .create(
                UserId::new("customer1"),
                CreateBooking::new("window-wash", "2025-04-02", "11:00", ""),
            )
            .await;

        assert!(matches!(result, Err(BookingError::Validation(_))));
        assert_eq!(service.dashboard_stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_cancel_uses_default_reason() {
        let service = create_service();
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();

        let result = service
            .cancel(created.booking.id(), &Actor::customer("customer1"), Some("  ".to_string()))
            .await
            .unwrap();

        assert_eq!(result.booking.cancelled_by(), Some(ActorRole::Customer));
        assert_eq!(result.booking.cancellation_reason(), Some("Cancelled by customer"));

        let events = service
            .event_logs(EventLogQuery::new().action(EventAction::BookingCancelled))
            .await
            .unwrap();
        assert_eq!(events[0].details["previousStatus"], "assigned");
        assert_eq!(events[0].details["reason"], "Cancelled by customer");
    }

    #[tokio::test]
    async fn test_cancel_by_stranger_is_forbidden() {
        let service = create_service();
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();

        let result = service
            .cancel(created.booking.id(), &Actor::customer("customer2"), None)
            .await;
        assert!(matches!(result, Err(BookingError::Forbidden(_))));

        let result = service
            .cancel(created.booking.id(), &Actor::provider("provider4"), None)
            .await;
        assert!(matches!(result, Err(BookingError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_provider_must_reject_rather_than_cancel_assigned_booking() {
        let service = create_service();
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();

        let result = service
            .cancel(created.booking.id(), &Actor::provider("provider1"), None)
            .await;
        assert!(matches!(
            result,
            Err(BookingError::InvalidState {
                current: BookingStatus::Assigned,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_override_out_of_cancelled_clears_cancellation() {
        let service = create_service();
        let admin = UserId::new("admin1");
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();
        let id = created.booking.id();

        let cancelled = service
            .admin_override_status(id, BookingStatus::Cancelled, None, &admin)
            .await
            .unwrap();
        assert_eq!(cancelled.booking.cancelled_by(), Some(ActorRole::Admin));
        assert_eq!(cancelled.booking.cancellation_reason(), Some("Cancelled by admin"));
        assert_eq!(
            cancelled.booking.status_history().last().unwrap().note,
            "Admin override: No reason provided"
        );

        let reopened = service
            .admin_override_status(id, BookingStatus::Pending, Some("Customer called".into()), &admin)
            .await
            .unwrap();
        assert_eq!(reopened.message, "Status changed from cancelled to pending");
        assert!(reopened.booking.cancelled_by().is_none());
        assert!(reopened.booking.cancellation_reason().is_none());
    }

    #[tokio::test]
    async fn test_admin_assign_unknown_provider() {
        let service = create_service();
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();

        let result = service
            .admin_assign_provider(
                created.booking.id(),
                &UserId::new("provider99"),
                &UserId::new("admin1"),
            )
            .await;
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_booking_authorization() {
        let service = create_service();
        let created = service
            .create(UserId::new("customer1"), window_wash())
            .await
            .unwrap();
        let id = created.booking.id();

        assert!(service.get_booking(id, &Actor::customer("customer1")).await.is_ok());
        assert!(service.get_booking(id, &Actor::provider("provider1")).await.is_ok());
        assert!(service.get_booking(id, &Actor::admin("admin1")).await.is_ok());
        assert!(matches!(
            service.get_booking(id, &Actor::provider("provider4")).await,
            Err(BookingError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_booking(BookingId::new(), &Actor::admin("admin1")).await,
            Err(BookingError::NotFound(_))
        ));
    }
}
