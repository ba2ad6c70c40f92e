//! Redis-backed session revocation store

use async_trait::async_trait;
use monkeys_core::{CoreError, Result, RevocationStore};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::debug;

/// Default key prefix for revoked session ids
pub const DEFAULT_REVOCATION_PREFIX: &str = "monkeys:revoked:";

/// Revocation set kept as one Redis key per revoked session id
///
/// Keys are written with a TTL matching the token lifetime, so expiry of
/// the record is handled by Redis.
pub struct RedisRevocationStore {
    client: redis::Client,
    key_prefix: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisRevocationStore {
    /// The connection is opened lazily on first use
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::configuration(format!("invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            connection: Mutex::new(None),
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
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
        debug!("Revocation store connected");
        Ok(conn)
    }

    async fn reset_connection(&self) {
        *self.connection.lock().await = None;
    }

    /// Mark a session revoked for `ttl_secs`
    pub async fn revoke(&self, session_id: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.set_ex(self.key(session_id), 1u8, ttl_secs).await;
        if let Err(e) = result {
            self.reset_connection().await;
            return Err(CoreError::cache(format!("Redis SETEX failed: {}", e)));
        }
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn is_revoked(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        match conn.exists::<_, bool>(self.key(session_id)).await {
            Ok(revoked) => Ok(revoked),
            Err(e) => {
                self.reset_connection().await;
                Err(CoreError::cache(format!("Redis EXISTS failed: {}", e)))
            }
        }
    }
}
