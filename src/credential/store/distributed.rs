/// Redis-backed credential store
///
/// Shares persisted credentials between vault nodes that run several
/// processes behind one identity. Entries carry no TTL; a stale token is
/// discovered when the target rejects it.

use crate::{
    credential::{store::CredentialStore, store::KeyLocks, CredentialKey, Token},
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info, warn};

/// Redis credential store
#[derive(Clone)]
pub struct RedisCredentialStore {
    connection: ConnectionManager,
    key_prefix: String,
    locks: KeyLocks,
}

impl RedisCredentialStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, key_prefix: String) -> VaultResult<Self> {
        info!("Connecting credential store to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            warn!("Failed to create Redis client: {}", e);
            VaultError::Storage(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            warn!("Failed to connect to Redis: {}", e);
            VaultError::Storage(format!("Redis connection failed: {}", e))
        })?;

        Ok(Self {
            connection,
            key_prefix,
            locks: KeyLocks::new(),
        })
    }

    fn build_key(&self, key: &CredentialKey) -> String {
        prefixed_key(&self.key_prefix, key)
    }
}

fn prefixed_key(prefix: &str, key: &CredentialKey) -> String {
    format!("{}{}", prefix, key.as_str())
}

/// An empty value is corruption, not a missing entry
fn decode_entry(redis_key: &str, value: Option<String>) -> VaultResult<Option<Token>> {
    match value {
        Some(v) if v.is_empty() => Err(VaultError::Storage(format!(
            "Credential entry {} is empty",
            redis_key
        ))),
        value => Ok(value.map(Token::new)),
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn load(&self, key: &CredentialKey) -> VaultResult<Option<Token>> {
        let redis_key = self.build_key(key);
        debug!("Credential GET: {}", redis_key);

        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(&redis_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", redis_key, e);
            VaultError::from(e)
        })?;

        decode_entry(&redis_key, value)
    }

    async fn store(&self, key: &CredentialKey, token: &Token) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;
        let redis_key = self.build_key(key);
        debug!("Credential SET: {}", redis_key);

        let mut conn = self.connection.clone();
        let _: () = conn
            .set(&redis_key, token.as_str())
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", redis_key, e);
                VaultError::from(e)
            })?;

        Ok(())
    }

    async fn remove(&self, key: &CredentialKey) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;
        let redis_key = self.build_key(key);
        debug!("Credential DELETE: {}", redis_key);

        let mut conn = self.connection.clone();
        let _: u64 = conn.del(&redis_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", redis_key, e);
            VaultError::from(e)
        })?;

        Ok(())
    }
}
