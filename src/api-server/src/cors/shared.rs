//! Shared fast-lookup origin set
//!
//! Every server instance reads one set of allowed origins from the shared
//! cache. Refreshes build the new set under a staging key and swap it in
//! with a single atomic transaction, so readers see either the old set or
//! the new one.

use async_trait::async_trait;
use monkeys_core::{CoreError, Result};
use redis::aio::MultiplexedConnection;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Default Redis key of the allowed-origin set
pub const DEFAULT_ORIGIN_SET_KEY: &str = "monkeys:cors:origins";

/// Member that keeps an empty set present in Redis
const SENTINEL: &str = "__monkeys_origin_set__";

#[async_trait]
pub trait SharedOriginSet: Send + Sync {
    /// Atomically replace the whole set, expiring after `ttl`
    async fn replace(&self, origins: &HashSet<String>, ttl: Duration) -> Result<()>;

    /// Membership of `origin`; `None` when the set is absent or expired
    async fn contains(&self, origin: &str) -> Result<Option<bool>>;
}

/// Redis set holding the allowed origins
pub struct RedisOriginSet {
    client: redis::Client,
    key: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisOriginSet {
    pub fn new(redis_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::configuration(format!("invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            key: key.into(),
            connection: Mutex::new(None),
        })
    }

    fn staging_key(&self) -> String {
        format!("{}:staging", self.key)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::cache(format!("Redis connection failed: {}", e)))?;
        *guard = Some(conn.clone());
        debug!(key = %self.key, "Origin set connected");
        Ok(conn)
    }

    async fn reset_connection(&self) {
        *self.connection.lock().await = None;
    }
}

#[async_trait]
impl SharedOriginSet for RedisOriginSet {
    async fn replace(&self, origins: &HashSet<String>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let staging = self.staging_key();
        let members: Vec<&str> = std::iter::once(SENTINEL)
            .chain(origins.iter().map(String::as_str))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&staging)
            .ignore()
            .sadd(&staging, members)
            .ignore()
            .cmd("EXPIRE")
            .arg(&staging)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .rename(&staging, &self.key)
            .ignore();

        let result: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        if let Err(e) = result {
            self.reset_connection().await;
            return Err(CoreError::cache(format!("origin set swap failed: {}", e)));
        }
        Ok(())
    }

    async fn contains(&self, origin: &str) -> Result<Option<bool>> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<(bool, bool)> = redis::pipe()
            .exists(&self.key)
            .sismember(&self.key, origin)
            .query_async(&mut conn)
            .await;

        match result {
            Ok((exists, member)) => Ok(membership(exists, member, origin)),
            Err(e) => {
                self.reset_connection().await;
                Err(CoreError::cache(format!("origin lookup failed: {}", e)))
            }
        }
    }
}

/// Set presence plus membership; the sentinel is never an origin
fn membership(exists: bool, member: bool, origin: &str) -> Option<bool> {
    exists.then_some(member && origin != SENTINEL)
}

#[derive(Debug, Default)]
struct StoredSet {
    origins: HashSet<String>,
    expires_at: Option<Instant>,
}

/// In-process shared set for tests and single-node deployments
///
/// Can simulate an unreachable cache and counts replacements.
#[derive(Clone, Default)]
pub struct InMemorySharedOriginSet {
    set: Arc<parking_lot::RwLock<Option<StoredSet>>>,
    unavailable: Arc<AtomicBool>,
    replacements: Arc<AtomicUsize>,
}

impl InMemorySharedOriginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the cache were down
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of successful swaps so far
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }

    /// Drop the set as if its TTL had elapsed
    pub fn expire_now(&self) {
        *self.set.write() = None;
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::cache("origin set unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedOriginSet for InMemorySharedOriginSet {
    async fn replace(&self, origins: &HashSet<String>, ttl: Duration) -> Result<()> {
        self.check_available()?;
        *self.set.write() = Some(StoredSet {
            origins: origins.clone(),
            expires_at: Some(Instant::now() + ttl),
        });
        self.replacements.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn contains(&self, origin: &str) -> Result<Option<bool>> {
        self.check_available()?;
        let set = self.set.read();
        Ok(set.as_ref().and_then(|stored| match stored.expires_at {
            Some(expires_at) if Instant::now() >= expires_at => None,
            _ => Some(stored.origins.contains(origin)),
        }))
    }
}
