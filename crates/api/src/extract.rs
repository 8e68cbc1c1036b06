//! Request extractors: caller identity and lenient JSON bodies.

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use booking_store::{ActorRole, BookingId};
use domain::Actor;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Header carrying the caller's user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller identity asserted by the upstream gateway.
///
/// Credentials are verified before requests reach this service, so the
/// headers are trusted as-is. Requests without them are rejected with 401.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Actor);

impl Authenticated {
    /// Returns the actor if their role is one of `roles`, else 403.
    pub fn require(self, roles: &[ActorRole]) -> Result<Actor, ApiError> {
        if roles.contains(&self.0.role) {
            Ok(self.0)
        } else {
            Err(ApiError::Forbidden(format!(
                "Role '{}' is not authorized to access this route",
                self.0.role
            )))
        }
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let (Some(id), Some(role)) = (header(USER_ID_HEADER), header(USER_ROLE_HEADER)) else {
            return Err(ApiError::Unauthorized(
                "Not authorized, no user identity provided".to_string(),
            ));
        };

        let role = match role.parse::<ActorRole>() {
            Ok(ActorRole::System) | Err(_) => {
                return Err(ApiError::Unauthorized(format!("Invalid user role: {role}")));
            }
            Ok(role) => role,
        };

        Ok(Authenticated(Actor::new(id, role)))
    }
}

/// JSON request body that treats an empty body as `T::default()`.
///
/// Malformed JSON is reported in the same `{success, message}` shape as
/// every other error.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
    }
}

/// Parses a booking ID path segment.
pub fn parse_booking_id(id: &str) -> Result<BookingId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid booking ID format: {e}")))?;
    Ok(BookingId::from(uuid))
}

/// Parses an optional query value with `FromStr`, mapping failures to 400.
pub fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(|e| ApiError::BadRequest(e.to_string())))
        .transpose()
}
