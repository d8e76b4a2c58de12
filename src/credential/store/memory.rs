/// In-memory credential store
use crate::{
    credential::{store::CredentialStore, store::KeyLocks, CredentialKey, Token},
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local credential store
///
/// Entries do not survive a restart. Clones share the same map, which makes
/// it usable as a test double for the durable backends: it counts calls and
/// can be switched into a failing mode.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<RwLock<HashMap<CredentialKey, Token>>>,
    locks: KeyLocks,
    failing: Arc<AtomicBool>,
    loads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a storage error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `load` calls seen so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `store` calls seen so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_available(&self) -> VaultResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::Storage(
                "Memory credential store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &CredentialKey) -> VaultResult<Option<Token>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &CredentialKey, token: &Token) -> VaultResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let _guard = self.locks.lock(key).await;
        self.entries.write().await.insert(key.clone(), token.clone());
        Ok(())
    }

    async fn remove(&self, key: &CredentialKey) -> VaultResult<()> {
        self.check_available()?;
        let _guard = self.locks.lock(key).await;
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_load_remove() {
        let store = MemoryCredentialStore::new();
        let key = CredentialKey::from("did:elastos:nodeB");

        assert_eq!(store.load(&key).await.unwrap(), None);

        store.store(&key, &Token::from("T1")).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), Some(Token::from("T1")));

        store.remove(&key).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), None);

        // Removing again is fine
        store.remove(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_mode_reports_storage_error() {
        let store = MemoryCredentialStore::new();
        let key = CredentialKey::from("k");
        store.set_failing(true);

        assert!(matches!(store.load(&key).await, Err(VaultError::Storage(_))));
        assert!(store.store(&key, &Token::from("T")).await.is_err());
        assert!(store.remove(&key).await.is_err());

        store.set_failing(false);
        assert!(store.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryCredentialStore::new();
        let clone = store.clone();
        clone
            .store(&CredentialKey::from("k"), &Token::from("T"))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.write_count(), 1);
    }
}
