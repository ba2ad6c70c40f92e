//! Organization store contract

use crate::error::{CoreError, Result};
use crate::types::OrgId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Organization data the core reads
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Allowed cross-origin values configured by one organization
    async fn get_organization_origins(&self, org_id: &str) -> Result<Vec<String>>;

    /// Allowed cross-origin values across every organization
    async fn list_all_organization_origins(&self) -> Result<Vec<String>>;

    /// Resolve an organization id from its slug.
    ///
    /// Returns [`CoreError::NotFound`] when no organization has the slug.
    async fn resolve_org_id_by_slug(&self, slug: &str) -> Result<OrgId>;

    /// Replace an organization's allowed origins
    async fn update_organization_origins(&self, org_id: &str, origins: Vec<String>) -> Result<()>;
}

#[derive(Debug, Clone)]
struct OrgRecord {
    slug: String,
    origins: Vec<String>,
}

/// In-memory organization store
///
/// Besides holding data, it can simulate an unreachable or slow database and
/// counts lookups, which the cache tests rely on.
#[derive(Clone, Default)]
pub struct InMemoryOrganizationStore {
    orgs: Arc<RwLock<HashMap<OrgId, OrgRecord>>>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<parking_lot::RwLock<Option<Duration>>>,
    slug_lookups: Arc<AtomicUsize>,
    origin_listings: Arc<AtomicUsize>,
}

impl InMemoryOrganizationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an organization
    pub async fn insert(&self, org_id: impl Into<String>, slug: impl Into<String>, origins: Vec<String>) {
        let mut orgs = self.orgs.write().await;
        orgs.insert(
            org_id.into(),
            OrgRecord {
                slug: slug.into(),
                origins,
            },
        );
    }

    /// Make every call fail as if the database were down
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of slug lookups served so far
    pub fn slug_lookups(&self) -> usize {
        self.slug_lookups.load(Ordering::SeqCst)
    }

    /// Number of full origin listings served so far
    pub fn origin_listings(&self) -> usize {
        self.origin_listings.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) -> Result<()> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::database("organization store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn get_organization_origins(&self, org_id: &str) -> Result<Vec<String>> {
        self.simulate_io().await?;
        let orgs = self.orgs.read().await;
        Ok(orgs.get(org_id).map(|o| o.origins.clone()).unwrap_or_default())
    }

    async fn list_all_organization_origins(&self) -> Result<Vec<String>> {
        self.origin_listings.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let orgs = self.orgs.read().await;
        Ok(orgs.values().flat_map(|o| o.origins.iter().cloned()).collect())
    }

    async fn resolve_org_id_by_slug(&self, slug: &str) -> Result<OrgId> {
        self.slug_lookups.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let orgs = self.orgs.read().await;
        orgs.iter()
            .find(|(_, record)| record.slug == slug)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| CoreError::not_found(format!("organization with slug '{}'", slug)))
    }

    async fn update_organization_origins(&self, org_id: &str, origins: Vec<String>) -> Result<()> {
        self.simulate_io().await?;
        let mut orgs = self.orgs.write().await;
        match orgs.get_mut(org_id) {
            Some(record) => {
                record.origins = origins;
                Ok(())
            }
            None => Err(CoreError::not_found(format!("organization '{}'", org_id))),
        }
    }
}
