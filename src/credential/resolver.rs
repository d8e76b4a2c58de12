/// Credential Resolver - top-level token cache for one target node
///
/// Resolution order:
/// 1. Token held in memory (no I/O)
/// 2. Fetch already in flight for the same key (joined, not repeated)
/// 3. Fetcher chain: persistent store, then the network handshake
///
/// A token reaches memory only from a successful fetch. Failures are never
/// cached. `invalidate_token` is the path back from a rejected request.

use crate::{
    backup::{AuthorizationContext, AuthorizationExchange, BackupContext, HttpAuthorizationExchange},
    config::CredentialConfig,
    credential::{
        inflight::{Lookup, PendingFetches},
        store::{self, CredentialStore},
        CodeFetcher, CredentialKey, FetcherChain, RemoteCredentialFetcher, Token,
    },
    error::{VaultError, VaultResult},
    identity::{NodeInfoIdentity, ServiceIdentityProvider, StaticServiceIdentity},
    metrics,
};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Memory tier: the current token and how many times it was invalidated
#[derive(Default)]
struct MemorySlot {
    token: Option<Token>,
    generation: u64,
}

#[derive(Default)]
struct TokenState {
    slot: RwLock<MemorySlot>,
}

impl TokenState {
    fn current(&self) -> Option<Token> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    fn snapshot(&self) -> (Option<Token>, u64) {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        (slot.token.clone(), slot.generation)
    }

    /// Keep `token` unless an invalidation happened since `generation`
    fn populate(&self, generation: u64, token: Token) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != generation {
            return false;
        }
        slot.token = Some(token);
        true
    }

    fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.token = None;
        slot.generation += 1;
    }
}

/// Resolves the bearer token for one (local node, target node) pairing
#[derive(Clone)]
pub struct CredentialResolver {
    key: CredentialKey,
    fetcher: Arc<dyn CodeFetcher>,
    state: Arc<TokenState>,
    pending: PendingFetches,
}

impl CredentialResolver {
    /// Create a resolver over an assembled fetcher chain
    pub fn new(key: CredentialKey, fetcher: Arc<dyn CodeFetcher>) -> Self {
        Self {
            key,
            fetcher,
            state: Arc::new(TokenState::default()),
            pending: PendingFetches::new(),
        }
    }

    /// Create a resolver from a chain builder
    pub fn from_chain(chain: FetcherChain) -> Self {
        let key = chain.key().clone();
        Self::new(key, chain.build())
    }

    /// Share an in-flight registry with other resolvers
    pub fn with_registry(mut self, pending: PendingFetches) -> Self {
        self.pending = pending;
        self
    }

    /// Standard chain for a backup target: persistent store over the network
    pub fn for_backup(
        context: AuthorizationContext,
        exchange: Arc<dyn AuthorizationExchange>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let key = context.credential_key();
        let remote = Arc::new(RemoteCredentialFetcher::new(context, exchange));
        Self::from_chain(FetcherChain::terminal(key, remote).cached_in(store))
    }

    /// Wire identity, HTTP exchange and store from configuration
    ///
    /// Opens a store of its own. Resolvers sharing one backing should open it
    /// once and use `from_config_with_store`.
    pub async fn from_config(config: &CredentialConfig, backup: &BackupContext) -> VaultResult<Self> {
        let store = store::open(&config.storage).await?;
        Self::from_config_with_store(config, backup, store)
    }

    /// Wire identity and HTTP exchange from configuration over an open store
    pub fn from_config_with_store(
        config: &CredentialConfig,
        backup: &BackupContext,
        store: Arc<dyn CredentialStore>,
    ) -> VaultResult<Self> {
        let caller: Arc<dyn ServiceIdentityProvider> = match &config.service.service_did {
            Some(did) => Arc::new(StaticServiceIdentity::new(did.clone())?),
            None => Arc::new(NodeInfoIdentity::new(
                config.service.provider_address.clone(),
                &config.authorization,
            )?),
        };

        let context = AuthorizationContext::from_backup_context(caller, backup)?;
        let exchange = Arc::new(HttpAuthorizationExchange::new(&config.authorization)?);

        Ok(Self::for_backup(context, exchange, store))
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    /// Token held in memory, without any I/O
    pub fn cached_token(&self) -> Option<Token> {
        self.state.current()
    }

    /// Get a token for the target node
    pub async fn get_token(&self) -> VaultResult<Token> {
        if let Some(token) = self.state.current() {
            metrics::CREDENTIAL_MEMORY_HITS_TOTAL.inc();
            return Ok(token);
        }

        // Read under the registry lock, where invalidation also happens
        let generation = AtomicU64::new(0);
        let lookup = self
            .pending
            .resolve(
                &self.key,
                || {
                    let (token, current) = self.state.snapshot();
                    generation.store(current, Ordering::SeqCst);
                    token
                },
                || {
                    let fetcher = self.fetcher.clone();
                    let state = self.state.clone();
                    let key = self.key.clone();
                    let generation = generation.load(Ordering::SeqCst);
                    async move {
                        let token = fetcher.fetch().await?;
                        if !state.populate(generation, token.clone()) {
                            debug!("Discarding token for {} fetched before invalidation", key);
                        }
                        Ok::<_, VaultError>(token)
                    }
                    .boxed()
                },
            )
            .await;

        match lookup {
            Lookup::Ready(token) => {
                metrics::CREDENTIAL_MEMORY_HITS_TOTAL.inc();
                Ok(token)
            }
            Lookup::Pending(fetch) => {
                let token = fetch.await?;
                // Joined a fetch another resolver started on a shared registry
                self.state.populate(generation.load(Ordering::SeqCst), token.clone());
                Ok(token)
            }
        }
    }

    /// Drop the token after the target rejected it
    ///
    /// Memory is cleared first and unconditionally. A storage failure while
    /// clearing the persistent tier is logged and returned; the next
    /// `get_token` still runs the full chain.
    pub async fn invalidate_token(&self) -> VaultResult<()> {
        self.pending.forget_with(&self.key, || self.state.clear()).await;
        metrics::CREDENTIAL_INVALIDATIONS_TOTAL.inc();
        info!("Invalidated backup credential for {}", self.key);

        let result = self.fetcher.invalidate().await;
        if let Err(e) = &result {
            warn!("Credential invalidation for {} incomplete: {}", self.key, e);
        }
        result
    }
}
