//! System (root) organization resolution
//!
//! The root organization is found by slug, never by a hardcoded id. The
//! resolved id is cached for a long TTL. Failed lookups are cached briefly
//! so an outage does not turn every request into a database call, and they
//! degrade to "no root detection".

use monkeys_core::{with_timeout, CoreError, OrgId, OrganizationStore};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default slug of the system organization
pub const DEFAULT_SYSTEM_ORG_SLUG: &str = "monkeys-system";

#[derive(Debug, Clone)]
pub struct SystemOrgConfig {
    pub slug: String,

    /// Lifetime of a resolved id
    pub ttl: Duration,

    /// Deadline for the slug lookup
    pub lookup_timeout: Duration,

    /// Lifetime of a failed lookup
    pub negative_ttl: Duration,
}

impl Default for SystemOrgConfig {
    fn default() -> Self {
        Self {
            slug: DEFAULT_SYSTEM_ORG_SLUG.to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            lookup_timeout: Duration::from_secs(2),
            negative_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedLookup {
    org_id: Option<OrgId>,
    fetched_at: Instant,
}

/// Resolves and caches the system organization id
pub struct SystemOrgResolver {
    store: Arc<dyn OrganizationStore>,
    config: SystemOrgConfig,
    cached: RwLock<Option<CachedLookup>>,
}

impl SystemOrgResolver {
    pub fn new(store: Arc<dyn OrganizationStore>, config: SystemOrgConfig) -> Self {
        Self {
            store,
            config,
            cached: RwLock::new(None),
        }
    }

    /// The system organization id, or `None` when it cannot be resolved
    ///
    /// Concurrent cold lookups may race; the lookup is idempotent so the
    /// last writer wins with the same value.
    pub async fn system_org_id(&self) -> Option<OrgId> {
        if let Some(org_id) = self.cached_value() {
            return org_id;
        }

        let lookup = with_timeout(
            self.config.lookup_timeout,
            "system organization lookup",
            self.store.resolve_org_id_by_slug(&self.config.slug),
        )
        .await;

        let org_id = match lookup {
            Ok(org_id) => {
                info!(slug = %self.config.slug, %org_id, "Resolved system organization");
                Some(org_id)
            }
            Err(CoreError::NotFound(_)) => {
                warn!(slug = %self.config.slug, "System organization not found, root detection disabled");
                None
            }
            Err(e) => {
                warn!(slug = %self.config.slug, error = %e, "System organization lookup failed, root detection disabled");
                None
            }
        };

        *self.cached.write() = Some(CachedLookup {
            org_id: org_id.clone(),
            fetched_at: Instant::now(),
        });
        org_id
    }

    /// Whether `org_id` is the system organization
    pub async fn is_system_org(&self, org_id: &str) -> bool {
        matches!(self.system_org_id().await, Some(system) if system == org_id)
    }

    /// Forget the cached lookup
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    /// Fast path: `Some(value)` when a fresh cached lookup exists
    fn cached_value(&self) -> Option<Option<OrgId>> {
        let cached = self.cached.read();
        let entry = cached.as_ref()?;
        let ttl = if entry.org_id.is_some() {
            self.config.ttl
        } else {
            self.config.negative_ttl
        };
        if entry.fetched_at.elapsed() < ttl {
            Some(entry.org_id.clone())
        } else {
            None
        }
    }
}
