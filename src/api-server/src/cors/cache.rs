//! Dynamic allowed-origin cache
//!
//! Lookup order for an origin:
//!
//! 1. static configuration (always allowed)
//! 2. the allow-all flag
//! 3. the requesting organization's own list, when one is known
//! 4. the shared set (bounded read)
//! 5. the in-process snapshot of the last successful refresh, when the
//!    shared set is unreachable or expired
//!
//! Only the allow-all flag admits an origin as [`OriginMatch::Any`];
//! every other step is [`OriginMatch::Listed`]. Credentials are shared with
//! listed origins only.
//!
//! A failing dependency falls back to the last-known-good snapshot and
//! never to "allow everything".
//!
//! Invalidation schedules a refresh and returns immediately. Until it
//! completes readers may still see the previous set; that window is one
//! refresh cycle long.

use super::normalize_origin;
use super::shared::{SharedOriginSet, DEFAULT_ORIGIN_SET_KEY};
use dashmap::DashMap;
use monkeys_core::{with_timeout, OrgId, OrganizationStore, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rule that admitted an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginMatch {
    /// Named in configuration, an organization list or the shared set
    Listed,
    /// Admitted only by the allow-all flag
    Any,
}

#[derive(Debug, Clone)]
pub struct OriginCacheConfig {
    /// Origins allowed regardless of database content
    pub static_origins: Vec<String>,

    /// Allow every origin
    pub allow_all: bool,

    /// Lifetime of the shared set
    pub ttl: Duration,

    /// Period of the background refresh
    pub refresh_interval: Duration,

    /// Deadline for a shared-set read on the request path
    pub read_timeout: Duration,

    /// Deadline for a database read
    pub refresh_timeout: Duration,

    /// Lifetime of a per-organization list
    pub org_ttl: Duration,

    /// Redis key of the shared set
    pub redis_key: String,
}

impl Default for OriginCacheConfig {
    fn default() -> Self {
        Self {
            static_origins: Vec::new(),
            allow_all: false,
            ttl: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(60),
            read_timeout: Duration::from_millis(500),
            refresh_timeout: Duration::from_secs(5),
            org_ttl: Duration::from_secs(60),
            redis_key: DEFAULT_ORIGIN_SET_KEY.to_string(),
        }
    }
}

struct OrgOrigins {
    origins: Arc<HashSet<String>>,
    fetched_at: Instant,
}

struct Inner {
    config: OriginCacheConfig,
    static_origins: HashSet<String>,
    store: Arc<dyn OrganizationStore>,
    shared: Arc<dyn SharedOriginSet>,
    fallback: RwLock<Arc<HashSet<String>>>,
    org_origins: DashMap<OrgId, OrgOrigins>,
    refresh_lock: tokio::sync::Mutex<()>,
    refreshes: AtomicU64,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Allowed-origin cache with its own refresh lifecycle
#[derive(Clone)]
pub struct OriginCache {
    inner: Arc<Inner>,
}

impl OriginCache {
    /// Build a cold cache; call [`OriginCache::start`] to seed it
    pub fn new(
        config: OriginCacheConfig,
        store: Arc<dyn OrganizationStore>,
        shared: Arc<dyn SharedOriginSet>,
    ) -> Self {
        let static_origins: HashSet<String> = config
            .static_origins
            .iter()
            .map(|origin| normalize_origin(origin))
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            inner: Arc::new(Inner {
                fallback: RwLock::new(Arc::new(static_origins.clone())),
                static_origins,
                config,
                store,
                shared,
                org_origins: DashMap::new(),
                refresh_lock: tokio::sync::Mutex::new(()),
                refreshes: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &OriginCacheConfig {
        &self.inner.config
    }

    /// Spawn the seeding refresh and the periodic refresh loop
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() {
            return;
        }

        let cache = self.clone();
        let cancel = self.inner.cancel.clone();
        let period = self.inner.config.refresh_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Failures are logged inside refresh
                        let _ = cache.refresh().await;
                    }
                }
            }
            debug!("Origin refresh loop stopped");
        }));
        info!(interval_secs = period.as_secs(), "Origin cache refresh started");
    }

    /// Stop the background refresh
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Origin refresh task ended abnormally");
            }
        }
    }

    /// Rebuild the allowed set from the database and publish it
    ///
    /// Refreshes are serialized, so a refresh that starts after a database
    /// write always observes it. Returns the size of the published set.
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.inner.refresh_lock.lock().await;

        let dynamic = match with_timeout(
            self.inner.config.refresh_timeout,
            "origin refresh",
            self.inner.store.list_all_organization_origins(),
        )
        .await
        {
            Ok(origins) => origins,
            Err(e) => {
                warn!(error = %e, "Origin refresh failed, keeping last known set");
                return Err(e);
            }
        };

        let mut allowed = self.inner.static_origins.clone();
        allowed.extend(
            dynamic
                .iter()
                .map(|origin| normalize_origin(origin))
                .filter(|origin| !origin.is_empty()),
        );
        let count = allowed.len();

        let published = with_timeout(
            self.inner.config.refresh_timeout,
            "origin set publish",
            self.inner.shared.replace(&allowed, self.inner.config.ttl),
        )
        .await;
        if let Err(e) = published {
            warn!(error = %e, "Shared origin set not updated, serving from local snapshot");
        }

        *self.inner.fallback.write() = Arc::new(allowed);
        self.inner.org_origins.clear();
        self.inner.refreshes.fetch_add(1, Ordering::SeqCst);
        debug!(count, "Origin set refreshed");
        Ok(count)
    }

    /// Drop cached per-organization lists and refresh in the background
    pub fn invalidate(&self) -> JoinHandle<()> {
        self.inner.org_origins.clear();
        let cache = self.clone();
        tokio::spawn(async move {
            let _ = cache.refresh().await;
        })
    }

    /// Whether a browser origin may call this service
    pub async fn is_origin_allowed(&self, origin: &str, org_id: Option<&str>) -> bool {
        self.check_origin(origin, org_id).await.is_some()
    }

    /// Rule that admits `origin`, or `None` when it is not allowed
    pub async fn check_origin(&self, origin: &str, org_id: Option<&str>) -> Option<OriginMatch> {
        let origin = normalize_origin(origin);
        if origin.is_empty() {
            return None;
        }

        if self.inner.static_origins.contains(&origin) {
            return Some(OriginMatch::Listed);
        }
        if self.inner.config.allow_all {
            return Some(OriginMatch::Any);
        }

        if let Some(org_id) = org_id {
            if let Some(org_allowed) = self.org_origins(org_id).await {
                if org_allowed.contains(&origin) {
                    return Some(OriginMatch::Listed);
                }
            }
        }

        let shared = with_timeout(
            self.inner.config.read_timeout,
            "origin lookup",
            self.inner.shared.contains(&origin),
        )
        .await;

        let listed = match shared {
            Ok(Some(member)) => member,
            Ok(None) => {
                debug!("Shared origin set absent, using local snapshot");
                self.inner.fallback.read().contains(&origin)
            }
            Err(e) => {
                warn!(error = %e, "Shared origin set unavailable, using local snapshot");
                self.inner.fallback.read().contains(&origin)
            }
        };
        listed.then_some(OriginMatch::Listed)
    }

    /// Origins of one organization, cached for `org_ttl`
    async fn org_origins(&self, org_id: &str) -> Option<Arc<HashSet<String>>> {
        if let Some(entry) = self.inner.org_origins.get(org_id) {
            if entry.fetched_at.elapsed() < self.inner.config.org_ttl {
                return Some(entry.origins.clone());
            }
        }

        let lookup = with_timeout(
            self.inner.config.refresh_timeout,
            "organization origin lookup",
            self.inner.store.get_organization_origins(org_id),
        )
        .await;

        match lookup {
            Ok(origins) => {
                let origins: Arc<HashSet<String>> =
                    Arc::new(origins.iter().map(|origin| normalize_origin(origin)).collect());
                self.inner.org_origins.insert(
                    org_id.to_string(),
                    OrgOrigins {
                        origins: origins.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(origins)
            }
            Err(e) => {
                warn!(org_id, error = %e, "Organization origin lookup failed");
                None
            }
        }
    }

    /// Snapshot served when the shared set is unreachable
    pub fn fallback_snapshot(&self) -> Arc<HashSet<String>> {
        self.inner.fallback.read().clone()
    }

    /// Number of successful refreshes
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }
}
