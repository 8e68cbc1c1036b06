//! Provider directory trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use booking_store::UserId;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Result;

/// A service provider as seen by the assignment engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_categories: Vec<String>,
    pub is_available: bool,

    /// Shown to customers only. Assignment never reads it.
    pub distance_km: f64,

    /// Registration time; older providers are offered work first.
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Returns true if the provider offers `service_type`.
    pub fn offers(&self, service_type: &str) -> bool {
        self.service_categories.iter().any(|c| c == service_type)
    }
}

/// Read-only view of the providers known to the marketplace.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Returns the oldest registered provider that is available, offers
    /// `service_type`, and is not in `excluded`.
    async fn find_available(
        &self,
        service_type: &str,
        excluded: &[UserId],
    ) -> Result<Option<Provider>>;

    /// Looks up a provider by ID.
    async fn get(&self, id: &UserId) -> Result<Option<Provider>>;

    /// Lists providers, optionally only those offering `service_type`.
    async fn list(&self, service_type: Option<&str>) -> Result<Vec<Provider>>;
}

/// In-memory provider directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderDirectory {
    providers: Arc<RwLock<Vec<Provider>>>,
}

impl InMemoryProviderDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding `providers`.
    pub fn with_providers(providers: Vec<Provider>) -> Self {
        Self {
            providers: Arc::new(RwLock::new(providers)),
        }
    }

    /// Creates a directory seeded with the demo providers.
    ///
    /// Registration order (and therefore assignment priority within a
    /// category) is the order listed here.
    pub fn demo() -> Self {
        let seeds: [(&str, &str, &str, &str, &[&str], f64); 7] = [
            (
                "provider1",
                "Mike Cleaner",
                "mike@example.com",
                "9876543211",
                &["sofa-cleaning", "window-wash", "floor-cleaning", "deep-cleaning"],
                1.5,
            ),
            (
                "provider4",
                "Sarah Sparkle",
                "sarah@example.com",
                "9876543214",
                &["sofa-cleaning", "window-wash", "deep-cleaning"],
                2.8,
            ),
            (
                "provider5",
                "Tom Tidy",
                "tom@example.com",
                "9876543215",
                &["floor-cleaning", "deep-cleaning", "window-wash"],
                5.2,
            ),
            (
                "provider2",
                "Sam Plumber",
                "sam@example.com",
                "9876543212",
                &["leaking-tap", "pipe-repair", "drain-cleaning", "bathroom-fitting"],
                3.8,
            ),
            (
                "provider3",
                "Alex Electrician",
                "alex@example.com",
                "9876543213",
                &["wiring-repair", "appliance-repair", "switch-installation"],
                7.2,
            ),
            (
                "provider6",
                "Emma Electric",
                "emma@example.com",
                "9876543216",
                &["wiring-repair", "appliance-repair", "switch-installation"],
                0.8,
            ),
            (
                "provider7",
                "David Wires",
                "david@example.com",
                "9876543217",
                &["switch-installation", "appliance-repair"],
                4.5,
            ),
        ];

        let registered = Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default();
        let providers = seeds
            .into_iter()
            .enumerate()
            .map(|(i, (id, name, email, phone, categories, distance_km))| Provider {
                id: UserId::new(id),
                name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                service_categories: categories.iter().map(|c| c.to_string()).collect(),
                is_available: true,
                distance_km,
                created_at: registered + Duration::days(i as i64),
            })
            .collect();

        Self::with_providers(providers)
    }

    /// Adds a provider.
    pub async fn add(&self, provider: Provider) {
        self.providers.write().await.push(provider);
    }

    /// Marks a provider available or unavailable.
    ///
    /// Returns false if no provider has that ID.
    pub async fn set_available(&self, id: &UserId, available: bool) -> bool {
        let mut providers = self.providers.write().await;
        match providers.iter_mut().find(|p| &p.id == id) {
            Some(provider) => {
                provider.is_available = available;
                true
            }
            None => false,
        }
    }

    /// Marks every provider offering `service_type` unavailable.
    pub async fn set_category_unavailable(&self, service_type: &str) {
        let mut providers = self.providers.write().await;
        for provider in providers.iter_mut().filter(|p| p.offers(service_type)) {
            provider.is_available = false;
        }
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn find_available(
        &self,
        service_type: &str,
        excluded: &[UserId],
    ) -> Result<Option<Provider>> {
        let providers = self.providers.read().await;
        Ok(providers
            .iter()
            .filter(|p| p.is_available && p.offers(service_type) && !excluded.contains(&p.id))
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn get(&self, id: &UserId) -> Result<Option<Provider>> {
        let providers = self.providers.read().await;
        Ok(providers.iter().find(|p| &p.id == id).cloned())
    }

    async fn list(&self, service_type: Option<&str>) -> Result<Vec<Provider>> {
        let providers = self.providers.read().await;
        let mut listed: Vec<_> = providers
            .iter()
            .filter(|p| service_type.is_none_or(|s| p.offers(s)))
            .cloned()
            .collect();
        listed.sort_by_key(|p| p.created_at);
        Ok(listed)
    }
}
