//! Inputs to lifecycle operations.

use booking_store::{ActorRole, BookingDetails, UserId};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::error::{BookingError, Result};

/// An authenticated caller: who they are and in which role they act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn customer(id: impl Into<UserId>) -> Self {
        Self::new(id, ActorRole::Customer)
    }

    pub fn provider(id: impl Into<UserId>) -> Self {
        Self::new(id, ActorRole::Provider)
    }

    pub fn admin(id: impl Into<UserId>) -> Self {
        Self::new(id, ActorRole::Admin)
    }
}

/// Request to create a booking.
///
/// Fields arrive as submitted and are checked by [`CreateBooking::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBooking {
    pub service_type: String,

    /// `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is used.
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub address: String,
    pub description: Option<String>,
}

impl CreateBooking {
    pub fn new(
        service_type: impl Into<String>,
        scheduled_date: impl Into<String>,
        scheduled_time: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            scheduled_date: scheduled_date.into(),
            scheduled_time: scheduled_time.into(),
            address: address.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks required fields and parses the date.
    pub fn validate(self) -> Result<BookingDetails> {
        let required = [
            &self.service_type,
            &self.scheduled_date,
            &self.scheduled_time,
            &self.address,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(BookingError::Validation(
                "Please provide serviceType, scheduledDate, scheduledTime, and address".to_string(),
            ));
        }

        let scheduled_date = parse_date(self.scheduled_date.trim()).ok_or_else(|| {
            BookingError::Validation(format!(
                "Invalid scheduledDate '{}'. Expected YYYY-MM-DD",
                self.scheduled_date
            ))
        })?;

        Ok(BookingDetails {
            service_type: self.service_type.trim().to_string(),
            scheduled_date,
            scheduled_time: self.scheduled_time.trim().to_string(),
            address: self.address.trim().to_string(),
            description: self.description.unwrap_or_default(),
        })
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

/// Which party failed to show up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoShowType {
    #[default]
    Provider,
    Customer,
}

impl NoShowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoShowType::Provider => "provider",
            NoShowType::Customer => "customer",
        }
    }
}

impl std::fmt::Display for NoShowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
