//! Effective-policy cache
//!
//! Caches the result of `PolicyStore::get_effective_policies` per principal.
//! Decisions are never cached: the request context changes on every call.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use blake3::Hasher;

use crate::policy::PolicyDocument;
use crate::types::Principal;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct PolicyCacheConfig {
    /// Cache effective policy sets at all
    pub enabled: bool,

    /// Maximum number of principals kept
    pub capacity: usize,

    /// Time-to-live for a cached policy set
    pub ttl: Duration,
}

impl Default for PolicyCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Cache key type (BLAKE3 hash)
type CacheKey = [u8; 32];

#[derive(Clone)]
struct CachedEntry {
    principal_id: String,
    documents: Arc<Vec<PolicyDocument>>,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Thread-safe, TTL-bounded cache of effective policy sets
pub struct PolicySetCache {
    entries: DashMap<CacheKey, CachedEntry>,
    config: PolicyCacheConfig,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl PolicySetCache {
    pub fn new(config: PolicyCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    /// Get the cached policy set for a principal
    pub fn get(&self, principal: &Principal) -> Option<Arc<Vec<PolicyDocument>>> {
        let key = Self::compute_key(principal);

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(&key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(&entry.documents));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a principal's policy set
    pub fn put(&self, principal: &Principal, documents: Arc<Vec<PolicyDocument>>) {
        let key = Self::compute_key(principal);

        if self.entries.len() >= self.config.capacity {
            self.evict();
        }

        self.entries.insert(
            key,
            CachedEntry {
                principal_id: principal.id.clone(),
                documents,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop every cached set for a principal id, whatever its type or org
    ///
    /// Group policy changes affect members, so callers invalidating a group
    /// usually want `clear` instead.
    pub fn invalidate_principal(&self, principal_id: &str) {
        self.entries.retain(|_, entry| entry.principal_id != principal_id);
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    fn compute_key(principal: &Principal) -> CacheKey {
        let mut hasher = Hasher::new();
        hasher.update(principal.principal_type.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(principal.id.as_bytes());
        hasher.update(b"|");
        hasher.update(principal.org_id.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Drop expired entries, then about a tenth of the rest if still full
    fn evict(&self) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));

        if self.entries.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
