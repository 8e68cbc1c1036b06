use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Booking, BookingId, BookingOrder, BookingQuery, EventLogEntry, EventLogQuery, Result,
    StoreError, Version,
    store::{BookingStore, EventLog, StatusCounts},
};

/// In-memory booking store.
///
/// Provides the same compare-and-swap semantics as the PostgreSQL
/// implementation; the write lock makes check-and-store atomic.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Removes all bookings.
    pub async fn clear(&self) {
        self.bookings.write().await.clear();
    }
}

fn matches_query(booking: &Booking, query: &BookingQuery) -> bool {
    if let Some(status) = query.status
        && booking.status() != status
    {
        return false;
    }
    if let Some(ref service_type) = query.service_type
        && booking.service_type() != service_type
    {
        return false;
    }
    if let Some(ref customer_id) = query.customer_id
        && booking.customer_id() != customer_id
    {
        return false;
    }
    if let Some(ref provider_id) = query.provider_id
        && booking.provider_id() != Some(provider_id)
    {
        return false;
    }
    true
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<Version> {
        let mut store = self.bookings.write().await;

        if store.contains_key(&booking.id()) {
            return Err(StoreError::DuplicateBooking(booking.id()));
        }

        let mut stored = booking.clone();
        stored.set_version(Version::first());
        store.insert(booking.id(), stored);

        Ok(Version::first())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn save(&self, booking: &Booking) -> Result<Version> {
        let mut store = self.bookings.write().await;
        let booking_id = booking.id();

        let current = store
            .get(&booking_id)
            .ok_or(StoreError::BookingNotFound(booking_id))?;

        if current.version() != booking.version() {
            metrics::counter!("booking_store_conflicts_total").increment(1);
            return Err(StoreError::ConcurrencyConflict {
                booking_id,
                expected: booking.version(),
                actual: current.version(),
            });
        }

        let new_version = booking.version().next();
        let mut stored = booking.clone();
        stored.set_version(new_version);
        store.insert(booking_id, stored);

        Ok(new_version)
    }

    async fn find(&self, query: BookingQuery) -> Result<Vec<Booking>> {
        let store = self.bookings.read().await;
        let mut bookings: Vec<_> = store
            .values()
            .filter(|b| matches_query(b, &query))
            .cloned()
            .collect();

        match query.order {
            BookingOrder::NewestFirst => {
                bookings.sort_by(|a, b| {
                    b.created_at()
                        .cmp(&a.created_at())
                        .then_with(|| b.id().as_uuid().cmp(&a.id().as_uuid()))
                });
            }
            BookingOrder::ScheduledDate => {
                bookings.sort_by(|a, b| {
                    a.scheduled_date()
                        .cmp(&b.scheduled_date())
                        .then_with(|| a.scheduled_time().cmp(b.scheduled_time()))
                });
            }
        }

        Ok(bookings)
    }

    async fn count_by_status(&self) -> Result<StatusCounts> {
        let store = self.bookings.read().await;
        let mut counts = StatusCounts::default();
        for booking in store.values() {
            counts.add(booking.status(), 1);
        }
        Ok(counts)
    }
}

/// In-memory append-only event log.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    entries: Arc<RwLock<Vec<EventLogEntry>>>,
}

impl InMemoryEventLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, entry: EventLogEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn query(&self, query: EventLogQuery) -> Result<Vec<EventLogEntry>> {
        let entries = self.entries.read().await;

        // Reverse insertion order first so the stable sort breaks timestamp
        // ties newest-first as well.
        let mut matching: Vec<_> = entries
            .iter()
            .rev()
            .filter(|e| {
                if let Some(id) = query.booking_id
                    && e.booking_id != id
                {
                    return false;
                }
                if let Some(action) = query.action
                    && e.action != action
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }

        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{ActorRole, BookingDetails, BookingStatus, EventAction, UserId};

    fn create_booking(customer: &str, service_type: &str, day: u32) -> Booking {
        Booking::new(
            UserId::new(customer),
            BookingDetails {
                service_type: service_type.to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
                scheduled_time: "09:30".to_string(),
                address: "4 Mill Lane".to_string(),
                description: String::new(),
            },
            3,
        )
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryBookingStore::new();
        let booking = create_booking("customer1", "window-wash", 1);

        let version = store.insert(&booking).await.unwrap();
        assert_eq!(version, Version::first());

        let loaded = store.get(booking.id()).await.unwrap().unwrap();
        assert_eq!(loaded.id(), booking.id());
        assert_eq!(loaded.version(), Version::first());
    }

    #[tokio::test]
    async fn insert_twice_fails() {
        let store = InMemoryBookingStore::new();
        let booking = create_booking("customer1", "window-wash", 1);
        store.insert(&booking).await.unwrap();

        let result = store.insert(&booking).await;
        assert!(matches!(result, Err(StoreError::DuplicateBooking(_))));
    }

    #[tokio::test]
    async fn save_increments_version() {
        let store = InMemoryBookingStore::new();
        let booking = create_booking("customer1", "window-wash", 1);
        store.insert(&booking).await.unwrap();

        let mut loaded = store.get(booking.id()).await.unwrap().unwrap();
        loaded.record_assignment_attempt();
        let version = store.save(&loaded).await.unwrap();

        assert_eq!(version, Version::new(2));
        let reloaded = store.get(booking.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.assignment_attempts(), 1);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn stale_save_is_a_conflict() {
        let store = InMemoryBookingStore::new();
        let booking = create_booking("customer1", "window-wash", 1);
        store.insert(&booking).await.unwrap();

        let mut first = store.get(booking.id()).await.unwrap().unwrap();
        let mut second = first.clone();

        first.cancel(ActorRole::Customer, "Changed plans", None, "Changed plans");
        store.save(&first).await.unwrap();

        second.transition(BookingStatus::Assigned, None, "Assigned");
        let result = store.save(&second).await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::first() && actual == Version::new(2)
        ));
        let stored = store.get(booking.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn save_unknown_booking_fails() {
        let store = InMemoryBookingStore::new();
        let booking = create_booking("customer1", "window-wash", 1);

        let result = store.save(&booking).await;
        assert!(matches!(result, Err(StoreError::BookingNotFound(_))));
    }

    fn created_at(booking: &Booking, at: chrono::DateTime<chrono::Utc>) -> Booking {
        let mut json = serde_json::to_value(booking).unwrap();
        json["createdAt"] = serde_json::json!(at);
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn newest_first_breaks_timestamp_ties_by_id() {
        let store = InMemoryBookingStore::new();
        let at = chrono::Utc::now();
        let mut bookings: Vec<_> = (1..=6)
            .map(|day| created_at(&create_booking("customer1", "window-wash", day), at))
            .collect();
        for booking in &bookings {
            store.insert(booking).await.unwrap();
        }
        bookings.sort_by(|a, b| b.id().as_uuid().cmp(&a.id().as_uuid()));
        let expected: Vec<_> = bookings.iter().map(|b| b.id()).collect();

        for _ in 0..3 {
            let found = store.find(BookingQuery::new()).await.unwrap();
            let ids: Vec<_> = found.iter().map(|b| b.id()).collect();
            assert_eq!(ids, expected);
        }
    }

    #[tokio::test]
    async fn find_with_filters_and_order() {
        let store = InMemoryBookingStore::new();
        let late = create_booking("customer1", "window-wash", 20);
        let early = create_booking("customer1", "window-wash", 5);
        let mut assigned = create_booking("customer2", "pipe-repair", 10);
        assigned.set_provider(UserId::new("provider2"));
        assigned.transition(BookingStatus::Assigned, None, "Assigned");

        for booking in [&late, &early, &assigned] {
            store.insert(booking).await.unwrap();
        }

        let mine = store
            .find(BookingQuery::for_customer(UserId::new("customer1")))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first: `early` was created after `late`.
        assert_eq!(mine[0].id(), early.id());

        let by_schedule = store
            .find(BookingQuery::new().order(BookingOrder::ScheduledDate))
            .await
            .unwrap();
        let ids: Vec<_> = by_schedule.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![early.id(), assigned.id(), late.id()]);

        let for_provider = store
            .find(BookingQuery::for_provider(UserId::new("provider2")))
            .await
            .unwrap();
        assert_eq!(for_provider.len(), 1);
        assert_eq!(for_provider[0].id(), assigned.id());

        let pending = store
            .find(BookingQuery::new().status(BookingStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn count_by_status() {
        let store = InMemoryBookingStore::new();
        let pending = create_booking("customer1", "window-wash", 1);
        let mut cancelled = create_booking("customer1", "window-wash", 2);
        cancelled.cancel(ActorRole::Customer, "No longer needed", None, "No longer needed");

        store.insert(&pending).await.unwrap();
        store.insert(&cancelled).await.unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.cancelled, 1);
    }

    #[tokio::test]
    async fn event_log_is_newest_first_and_filterable() {
        let log = InMemoryEventLog::new();
        let booking_a = BookingId::new();
        let booking_b = BookingId::new();

        log.append(EventLogEntry::auto_cancelled(booking_a, 3))
            .await
            .unwrap();
        log.append(EventLogEntry::no_show(
            booking_b,
            UserId::new("admin1"),
            "provider",
        ))
        .await
        .unwrap();
        log.append(EventLogEntry::service_started(
            booking_a,
            UserId::new("provider1"),
        ))
        .await
        .unwrap();

        assert_eq!(log.entry_count().await, 3);

        let for_a = log.query(EventLogQuery::for_booking(booking_a)).await.unwrap();
        let actions: Vec<_> = for_a.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![EventAction::ServiceStarted, EventAction::AutoCancelled]
        );

        let no_shows = log
            .query(EventLogQuery::new().action(EventAction::NoShow))
            .await
            .unwrap();
        assert_eq!(no_shows.len(), 1);
        assert_eq!(no_shows[0].booking_id, booking_b);

        let limited = log.query(EventLogQuery::new().limit(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].action, EventAction::ServiceStarted);
    }
}
