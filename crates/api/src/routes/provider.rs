//! Provider endpoints for working assigned bookings.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use booking_store::{ActorRole, Booking, BookingStatus, BookingStore, EventLog};
use serde::Deserialize;

use super::bookings::{CancelRequest, StatusFilter};
use super::{ApiResponse, AppState};
use crate::error::ApiError;
use crate::extract::{Authenticated, JsonBody, parse_booking_id, parse_optional};

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub notes: Option<String>,
}

const PROVIDER: &[ActorRole] = &[ActorRole::Provider];

/// GET /api/provider/bookings: bookings assigned to the caller, earliest first.
#[tracing::instrument(skip(state, auth))]
pub async fn list<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let status = parse_optional::<BookingStatus>(filter.status.as_deref())?;
    let bookings = state.service.provider_bookings(&provider.id, status).await?;
    Ok(Json(ApiResponse::list(bookings)))
}

/// PATCH /api/provider/bookings/{id}/accept
#[tracing::instrument(skip(state, auth))]
pub async fn accept<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let result = state
        .service
        .accept(parse_booking_id(&id)?, &provider.id)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/provider/bookings/{id}/reject: release the booking for reassignment.
#[tracing::instrument(skip(state, auth, req))]
pub async fn reject<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<RejectRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let result = state
        .service
        .reject(parse_booking_id(&id)?, &provider.id, req.reason)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/provider/bookings/{id}/start
#[tracing::instrument(skip(state, auth))]
pub async fn start<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let result = state
        .service
        .start(parse_booking_id(&id)?, &provider.id)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/provider/bookings/{id}/complete
#[tracing::instrument(skip(state, auth, req))]
pub async fn complete<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CompleteRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let result = state
        .service
        .complete(parse_booking_id(&id)?, &provider.id, req.notes)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/provider/bookings/{id}/cancel
#[tracing::instrument(skip(state, auth, req))]
pub async fn cancel<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CancelRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let provider = auth.require(PROVIDER)?;
    let result = state
        .service
        .cancel(parse_booking_id(&id)?, &provider, req.reason)
        .await?;
    Ok(Json(result.into()))
}
