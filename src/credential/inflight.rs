/// In-flight fetch registry
///
/// Maps each credential key to the one fetch currently running for it.
/// Callers that find a fetch in flight await a clone of the same shared
/// handle and all receive the same token or the same error.
///
/// The fetch itself runs on its own task, so a caller that gives up (for
/// example through `tokio::time::timeout`) never cancels it for the others.

use crate::{
    credential::{CredentialKey, Token},
    error::{VaultError, VaultResult},
    metrics,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
#[cfg(test)]
use tokio::sync::MutexGuard;
use tracing::debug;

/// Handle on a fetch that every waiter can await
pub type SharedFetch = Shared<BoxFuture<'static, VaultResult<Token>>>;

pub(crate) struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

/// Outcome of looking a key up in the registry
pub enum Lookup {
    /// A token was already available
    Ready(Token),
    /// A fetch is running, started by this call or an earlier one
    Pending(SharedFetch),
}

/// Per-key registry of running fetches
///
/// Clones share the registry, so several resolvers can de-duplicate
/// against each other.
#[derive(Clone, Default)]
pub struct PendingFetches {
    inflight: Arc<Mutex<HashMap<CredentialKey, InFlight>>>,
    next_id: Arc<AtomicU64>,
}

impl PendingFetches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a ready token, or join the fetch running for `key`, or start one
    ///
    /// `cached` always runs first and `start` runs last, both under the
    /// registry lock, so two callers can never both see an empty cache and
    /// both start a fetch.
    pub async fn resolve<C, S>(&self, key: &CredentialKey, cached: C, start: S) -> Lookup
    where
        C: FnOnce() -> Option<Token>,
        S: FnOnce() -> BoxFuture<'static, VaultResult<Token>>,
    {
        let mut inflight = self.inflight.lock().await;

        if let Some(token) = cached() {
            return Lookup::Ready(token);
        }

        if let Some(running) = inflight.get(key) {
            debug!("Joining in-flight credential fetch for {}", key);
            metrics::CREDENTIAL_FETCH_JOINS_TOTAL.inc();
            return Lookup::Pending(running.fetch.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let work = start();
        let registry = self.clone();
        let task_key = key.clone();

        // Deregisters itself once finished; blocked on the lock held here
        // until this entry is inserted
        let handle = tokio::spawn(async move {
            let result = work.await;
            registry.finish(&task_key, id).await;
            result
        });

        let fetch = async move {
            handle.await.unwrap_or_else(|e| {
                Err(VaultError::Internal(format!(
                    "Credential fetch task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared();

        debug!("Started credential fetch {} for {}", id, key);
        inflight.insert(
            key.clone(),
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );

        Lookup::Pending(fetch)
    }

    /// Detach the running fetch for `key` so the next caller starts anew
    ///
    /// Callers already waiting still receive its result.
    pub async fn forget(&self, key: &CredentialKey) {
        self.forget_with(key, || ()).await;
    }

    /// `forget`, running `on_forget` under the registry lock
    ///
    /// No `resolve` call observes the registry between the two.
    pub async fn forget_with<F: FnOnce()>(&self, key: &CredentialKey, on_forget: F) {
        let mut inflight = self.inflight.lock().await;
        inflight.remove(key);
        on_forget();
    }

    /// Hold the registry lock, parking every `resolve` and `forget`
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> MutexGuard<'_, HashMap<CredentialKey, InFlight>> {
        self.inflight.lock().await
    }

    /// Whether a fetch is currently registered for `key`
    pub async fn is_pending(&self, key: &CredentialKey) -> bool {
        self.inflight.lock().await.contains_key(key)
    }

    async fn finish(&self, key: &CredentialKey, id: u64) {
        let mut inflight = self.inflight.lock().await;
        // A forgotten fetch may have been replaced by a newer one
        if inflight.get(key).map(|running| running.id) == Some(id) {
            inflight.remove(key);
        }
    }
}
