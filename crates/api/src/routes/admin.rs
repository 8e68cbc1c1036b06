//! Admin endpoints: oversight, overrides and the audit log.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use booking_store::{
    ActorRole, Booking, BookingQuery, BookingStatus, BookingStore, EventAction, EventLog,
    EventLogEntry, EventLogQuery, StatusCounts, UserId,
};
use domain::NoShowType;
use serde::Deserialize;

use super::{ApiResponse, AppState};
use crate::error::ApiError;
use crate::extract::{Authenticated, JsonBody, parse_booking_id, parse_optional};

/// Entries returned by the log endpoint when no limit is given.
const DEFAULT_LOG_LIMIT: usize = 50;

const ADMIN: &[ActorRole] = &[ActorRole::Admin];

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilters {
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub customer_id: Option<String>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilters {
    pub booking_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverrideRequest {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub provider_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoShowRequest {
    #[serde(rename = "type", default)]
    pub no_show_type: NoShowType,
}

// -- Handlers --

/// GET /api/admin/bookings: every booking, filtered, newest first.
#[tracing::instrument(skip(state, auth))]
pub async fn list<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Query(filters): Query<BookingFilters>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    auth.require(ADMIN)?;

    let mut query =
        BookingQuery::new().maybe_status(parse_optional(filters.status.as_deref())?);
    if let Some(service_type) = non_empty(filters.service_type) {
        query = query.service_type(service_type);
    }
    if let Some(customer_id) = non_empty(filters.customer_id) {
        query = query.customer_id(UserId::new(customer_id));
    }
    if let Some(provider_id) = non_empty(filters.provider_id) {
        query = query.provider_id(UserId::new(provider_id));
    }

    let bookings = state.service.all_bookings(query).await?;
    Ok(Json(ApiResponse::list(bookings)))
}

/// GET /api/admin/stats: booking counts per status.
#[tracing::instrument(skip(state, auth))]
pub async fn stats<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<StatusCounts>>, ApiError> {
    auth.require(ADMIN)?;
    let counts = state.service.dashboard_stats().await?;
    Ok(Json(ApiResponse::data(counts)))
}

/// PATCH /api/admin/bookings/{id}/override: set any status.
#[tracing::instrument(skip(state, auth, req))]
pub async fn override_status<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<OverrideRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let admin = auth.require(ADMIN)?;
    let booking_id = parse_booking_id(&id)?;
    let status: BookingStatus = req
        .status
        .parse()
        .map_err(|e: booking_store::ParseStatusError| ApiError::BadRequest(e.to_string()))?;

    let result = state
        .service
        .admin_override_status(booking_id, status, req.reason, &admin.id)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/admin/bookings/{id}/assign: bind a chosen provider.
#[tracing::instrument(skip(state, auth, req))]
pub async fn assign<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AssignRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let admin = auth.require(ADMIN)?;
    let booking_id = parse_booking_id(&id)?;
    let provider_id = non_empty(req.provider_id)
        .map(UserId::new)
        .ok_or_else(|| ApiError::BadRequest("Provider ID is required".to_string()))?;

    let result = state
        .service
        .admin_assign_provider(booking_id, &provider_id, &admin.id)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/admin/bookings/{id}/no-show
#[tracing::instrument(skip(state, auth, req))]
pub async fn no_show<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<NoShowRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let admin = auth.require(ADMIN)?;
    let result = state
        .service
        .admin_mark_no_show(parse_booking_id(&id)?, req.no_show_type, &admin.id)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/admin/logs: audit entries, newest first.
#[tracing::instrument(skip(state, auth))]
pub async fn logs<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Query(filters): Query<LogFilters>,
) -> Result<Json<ApiResponse<Vec<EventLogEntry>>>, ApiError> {
    auth.require(ADMIN)?;

    let limit = parse_optional::<usize>(filters.limit.as_deref())?.unwrap_or(DEFAULT_LOG_LIMIT);
    let mut query = EventLogQuery::new().limit(limit);
    if let Some(booking_id) = non_empty(filters.booking_id) {
        query = query.booking_id(parse_booking_id(&booking_id)?);
    }
    if let Some(action) = parse_optional::<EventAction>(filters.action.as_deref())? {
        query = query.action(action);
    }

    let entries = state.service.event_logs(query).await?;
    Ok(Json(ApiResponse::list(entries)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
