//! Provider directory listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use booking_store::{BookingStore, EventLog};
use domain::Provider;
use serde::Deserialize;

use super::{ApiResponse, AppState};
use crate::error::ApiError;
use crate::extract::Authenticated;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFilter {
    pub service_type: Option<String>,
}

/// GET /api/providers: registered providers, oldest first.
#[tracing::instrument(skip(state, _auth))]
pub async fn list<S: BookingStore + 'static, L: EventLog + 'static>(
    State(state): State<Arc<AppState<S, L>>>,
    _auth: Authenticated,
    Query(filter): Query<ProviderFilter>,
) -> Result<Json<ApiResponse<Vec<Provider>>>, ApiError> {
    let service_type = filter.service_type.as_deref().filter(|s| !s.is_empty());
    let providers = state.service.list_providers(service_type).await?;
    Ok(Json(ApiResponse::list(providers)))
}
