//! HTTP API server with observability for the booking marketplace.
//!
//! Provides REST endpoints for customers, providers and admins over the
//! booking lifecycle, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use booking_store::{BookingStore, EventLog};
use domain::{BookingService, InMemoryProviderDirectory};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: BookingStore + 'static,
    L: EventLog + 'static,
{
    use routes::{admin, bookings, provider, providers};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        // Customer
        .route("/bookings", post(bookings::create::<S, L>))
        .route("/bookings/my", get(bookings::mine::<S, L>))
        .route("/bookings/{id}", get(bookings::get::<S, L>))
        .route("/bookings/{id}/cancel", patch(bookings::cancel::<S, L>))
        .route("/bookings/{id}/history", get(bookings::history::<S, L>))
        // Provider
        .route("/provider/bookings", get(provider::list::<S, L>))
        .route("/provider/bookings/{id}/accept", patch(provider::accept::<S, L>))
        .route("/provider/bookings/{id}/reject", patch(provider::reject::<S, L>))
        .route("/provider/bookings/{id}/start", patch(provider::start::<S, L>))
        .route("/provider/bookings/{id}/complete", patch(provider::complete::<S, L>))
        .route("/provider/bookings/{id}/cancel", patch(provider::cancel::<S, L>))
        // Admin
        .route("/admin/bookings", get(admin::list::<S, L>))
        .route("/admin/stats", get(admin::stats::<S, L>))
        .route("/admin/bookings/{id}/override", patch(admin::override_status::<S, L>))
        .route("/admin/bookings/{id}/assign", patch(admin::assign::<S, L>))
        .route("/admin/bookings/{id}/no-show", patch(admin::no_show::<S, L>))
        .route("/admin/logs", get(admin::logs::<S, L>))
        // Directory
        .route("/providers", get(providers::list::<S, L>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given backends and the demo
/// provider directory.
pub fn create_default_state<S, L>(store: S, log: L, max_assignment_attempts: u32) -> Arc<AppState<S, L>>
where
    S: BookingStore + 'static,
    L: EventLog + 'static,
{
    let service = BookingService::new(store, log, InMemoryProviderDirectory::demo())
        .with_max_assignment_attempts(max_assignment_attempts);
    Arc::new(AppState::new(service))
}
