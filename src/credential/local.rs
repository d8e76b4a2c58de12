/// Read-through, write-through caching tier over a persistent store
use crate::{
    credential::{store::CredentialStore, CodeFetcher, CredentialKey, Token},
    error::VaultResult,
    metrics,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decorates one inner fetcher with a persistent credential store
///
/// Only tokens produced by the inner fetcher are written; a token read from
/// the store is returned as is.
#[derive(Clone)]
pub struct LocalCachingFetcher {
    key: CredentialKey,
    store: Arc<dyn CredentialStore>,
    inner: Arc<dyn CodeFetcher>,
}

impl LocalCachingFetcher {
    pub fn new(
        key: CredentialKey,
        store: Arc<dyn CredentialStore>,
        inner: Arc<dyn CodeFetcher>,
    ) -> Self {
        Self { key, store, inner }
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    async fn restore(&self) -> Option<Token> {
        let store = self.store.name();
        match self.store.load(&self.key).await {
            Ok(Some(token)) => {
                debug!("Credential HIT in {} store: {}", store, self.key);
                metrics::record_store_lookup(store, "hit");
                Some(token)
            }
            Ok(None) => {
                debug!("Credential MISS in {} store: {}", store, self.key);
                metrics::record_store_lookup(store, "miss");
                None
            }
            Err(e) => {
                // Fall through to the inner tier
                warn!("Failed to load credential for {} from {} store: {}", self.key, store, e);
                metrics::record_store_lookup(store, "error");
                None
            }
        }
    }
}

#[async_trait]
impl CodeFetcher for LocalCachingFetcher {
    async fn fetch(&self) -> VaultResult<Token> {
        if let Some(token) = self.restore().await {
            return Ok(token);
        }

        let token = self.inner.fetch().await?;

        if let Err(e) = self.store.store(&self.key, &token).await {
            // The token is still good for this process
            warn!(
                "Failed to persist credential for {} in {} store: {}",
                self.key,
                self.store.name(),
                e
            );
            metrics::CREDENTIAL_STORAGE_WRITE_FAILURES_TOTAL.inc();
        }

        Ok(token)
    }

    async fn invalidate(&self) -> VaultResult<()> {
        let removed = self.store.remove(&self.key).await;
        if let Err(e) = &removed {
            warn!(
                "Failed to remove credential for {} from {} store: {}",
                self.key,
                self.store.name(),
                e
            );
        }

        // Inner tiers are cleared even when this one failed
        let inner = self.inner.invalidate().await;

        removed.and(inner)
    }
}
