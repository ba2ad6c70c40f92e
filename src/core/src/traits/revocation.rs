//! Session revocation store contract

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Fast-lookup set of revoked session identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Whether the session has been revoked
    async fn is_revoked(&self, session_id: &str) -> Result<bool>;
}

/// In-memory revocation store
#[derive(Clone, Default)]
pub struct InMemoryRevocationStore {
    revoked: Arc<RwLock<HashSet<String>>>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<parking_lot::RwLock<Option<Duration>>>,
}

impl InMemoryRevocationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a session as revoked
    pub async fn revoke(&self, session_id: impl Into<String>) {
        self.revoked.write().await.insert(session_id.into());
    }

    /// Make lookups fail as if the store were down
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every lookup by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::cache("revocation store unavailable"));
        }
        Ok(self.revoked.read().await.contains(session_id))
    }
}
