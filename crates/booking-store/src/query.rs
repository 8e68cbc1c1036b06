use crate::{BookingId, BookingStatus, EventAction, UserId};

/// Sort order for booking listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookingOrder {
    /// Most recently created first.
    #[default]
    NewestFirst,

    /// Earliest scheduled date first (provider work queue).
    ScheduledDate,
}

/// Builder for filtering bookings.
///
/// All filters are optional and combined with AND.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    /// Filter by status.
    pub status: Option<BookingStatus>,

    /// Filter by service type.
    pub service_type: Option<String>,

    /// Filter by owning customer.
    pub customer_id: Option<UserId>,

    /// Filter by assigned provider.
    pub provider_id: Option<UserId>,

    /// Result ordering.
    pub order: BookingOrder,
}

impl BookingQuery {
    /// Creates a new query matching every booking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one customer's bookings.
    pub fn for_customer(customer_id: UserId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    /// Creates a query for one provider's bookings, earliest scheduled first.
    pub fn for_provider(provider_id: UserId) -> Self {
        Self {
            provider_id: Some(provider_id),
            order: BookingOrder::ScheduledDate,
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by status when one is given.
    pub fn maybe_status(mut self, status: Option<BookingStatus>) -> Self {
        self.status = status;
        self
    }

    /// Filters by service type.
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Filters by customer.
    pub fn customer_id(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Filters by provider.
    pub fn provider_id(mut self, provider_id: UserId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    /// Sets the result ordering.
    pub fn order(mut self, order: BookingOrder) -> Self {
        self.order = order;
        self
    }
}

/// Builder for reading the event log.
///
/// Results are always ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct EventLogQuery {
    /// Filter by booking.
    pub booking_id: Option<BookingId>,

    /// Filter by action.
    pub action: Option<EventAction>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl EventLogQuery {
    /// Creates a new query matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one booking's entries.
    pub fn for_booking(booking_id: BookingId) -> Self {
        Self {
            booking_id: Some(booking_id),
            ..Default::default()
        }
    }

    /// Filters by booking.
    pub fn booking_id(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    /// Filters by action.
    pub fn action(mut self, action: EventAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Limits the number of entries returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
