//! Which status each actor may move a booking into next.

use booking_store::{ActorRole, BookingStatus};

use BookingStatus::*;

/// Returns the statuses `role` may move a booking in `current` into.
///
/// `System` gets an empty set: engine transitions (assignment, rejection
/// reset, auto-cancel) are applied directly and never looked up here.
pub fn allowed_transitions(current: BookingStatus, role: ActorRole) -> &'static [BookingStatus] {
    match (current, role) {
        (_, ActorRole::System) => &[],

        (Pending, ActorRole::Customer) => &[Cancelled],
        (Pending, ActorRole::Provider) => &[],
        (Pending, ActorRole::Admin) => &[Cancelled, Assigned],

        (Assigned, ActorRole::Customer) => &[Cancelled],
        (Assigned, ActorRole::Provider) => &[Accepted],
        (Assigned, ActorRole::Admin) => &[Cancelled, Pending, Accepted],

        (Accepted, ActorRole::Customer) => &[Cancelled],
        (Accepted, ActorRole::Provider) => &[InProgress, Cancelled],
        (Accepted, ActorRole::Admin) => &[Cancelled, Pending, InProgress],

        (InProgress, ActorRole::Customer) => &[],
        (InProgress, ActorRole::Provider) => &[Completed],
        (InProgress, ActorRole::Admin) => &[Cancelled, Completed],

        (Completed, _) => &[],

        (Cancelled, ActorRole::Customer) => &[],
        (Cancelled, ActorRole::Provider) => &[],
        (Cancelled, ActorRole::Admin) => &[Pending],
    }
}

/// Returns true if `role` may move a booking from `current` to `next`.
pub fn is_valid_transition(current: BookingStatus, next: BookingStatus, role: ActorRole) -> bool {
    allowed_transitions(current, role).contains(&next)
}

/// Returns the statuses from which `role` may move a booking into `next`.
pub fn sources_for(next: BookingStatus, role: ActorRole) -> Vec<BookingStatus> {
    BookingStatus::ALL
        .into_iter()
        .filter(|current| is_valid_transition(*current, next, role))
        .collect()
}

pub(crate) fn record_transition(to: BookingStatus) {
    metrics::counter!("booking_status_transitions_total", "to" => to.as_str()).increment(1);
}
