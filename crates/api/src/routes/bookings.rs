//! Customer booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking_store::{ActorRole, Booking, BookingStatus, BookingStore, EventLog};
use domain::{AssignmentOutcome, BookingHistory, CreateBooking};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState};
use crate::error::ApiError;
use crate::extract::{Authenticated, JsonBody, parse_booking_id, parse_optional};

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreatedResponse {
    pub booking: Booking,
    pub assignment_status: AssignmentOutcome,
}

// -- Handlers --

/// POST /api/bookings: create a booking and try to assign a provider.
#[tracing::instrument(skip(state, auth, req))]
pub async fn create<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    JsonBody(req): JsonBody<CreateBooking>,
) -> Result<(StatusCode, Json<ApiResponse<BookingCreatedResponse>>), ApiError> {
    let customer = auth.require(&[ActorRole::Customer])?;
    let result = state.service.create(customer.id, req).await?;

    // The service always runs one attempt on creation.
    let assignment_status = result
        .assignment
        .unwrap_or(AssignmentOutcome::NoAvailableProviders);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            result.message,
            BookingCreatedResponse {
                booking: result.booking,
                assignment_status,
            },
        )),
    ))
}

/// GET /api/bookings/my: list the caller's bookings, newest first.
#[tracing::instrument(skip(state, auth))]
pub async fn mine<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let customer = auth.require(&[ActorRole::Customer])?;
    let status = parse_optional::<BookingStatus>(filter.status.as_deref())?;
    let bookings = state.service.customer_bookings(&customer.id, status).await?;
    Ok(Json(ApiResponse::list(bookings)))
}

/// GET /api/bookings/{id}: load one booking the caller may see.
#[tracing::instrument(skip(state, auth))]
pub async fn get<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state.service.get_booking(booking_id, &auth.0).await?;
    Ok(Json(ApiResponse::data(booking)))
}

/// PATCH /api/bookings/{id}/cancel: cancel on behalf of the customer.
#[tracing::instrument(skip(state, auth, req))]
pub async fn cancel<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CancelRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let customer = auth.require(&[ActorRole::Customer])?;
    let booking_id = parse_booking_id(&id)?;
    let result = state
        .service
        .cancel(booking_id, &customer, req.reason)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/bookings/{id}/history: status history plus audit entries.
#[tracing::instrument(skip(state, auth))]
pub async fn history<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BookingHistory>>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let history = state.service.booking_history(booking_id, &auth.0).await?;
    Ok(Json(ApiResponse::data(history)))
}
