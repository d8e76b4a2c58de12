/// Persistent Credential Storage
///
/// Durable mapping from target service to the last token obtained for it.
/// Supports multiple backend implementations (SQLite, files, Redis, memory).

pub mod disk;
pub mod distributed;
pub mod memory;
pub mod sqlite;

pub use disk::FileCredentialStore;
pub use distributed::RedisCredentialStore;
pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

use crate::{
    config::{StorageConfig, StoreKind},
    credential::{CredentialKey, Token},
    db,
    error::VaultResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Credential storage backend trait
///
/// Implementations may be shared by many resolvers. Writes to the same key
/// are serialised; reads of different keys run concurrently. I/O failures
/// are reported as `VaultError::Storage`, never as a missing entry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Short backend name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Load the token stored for a key
    async fn load(&self, key: &CredentialKey) -> VaultResult<Option<Token>>;

    /// Store or replace the token for a key
    async fn store(&self, key: &CredentialKey, token: &Token) -> VaultResult<()>;

    /// Remove the token for a key; removing a missing key succeeds
    async fn remove(&self, key: &CredentialKey) -> VaultResult<()>;
}

/// Per-key write locks shared by a store's clones
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<Mutex<HashMap<CredentialKey, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock for a key
    ///
    /// Locks nobody else holds are pruned on the way in.
    pub async fn lock(&self, key: &CredentialKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Open the store selected by configuration
pub async fn open(config: &StorageConfig) -> VaultResult<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.kind {
        StoreKind::Sqlite => {
            let pool = db::create_pool(&config.database, db::DatabaseOptions::default()).await?;
            Arc::new(SqliteCredentialStore::open(pool).await?)
        }
        StoreKind::File => Arc::new(FileCredentialStore::open(config.directory.clone()).await?),
        StoreKind::Redis => Arc::new(
            RedisCredentialStore::connect(&config.redis_url, config.key_prefix.clone()).await?,
        ),
        StoreKind::Memory => Arc::new(MemoryCredentialStore::new()),
    };

    tracing::info!("Opened {} credential store", store.name());
    Ok(store)
}
