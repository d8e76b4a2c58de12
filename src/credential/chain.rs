/// Composition of fetcher tiers
///
/// A chain starts at a terminal fetcher and is wrapped tier by tier, each
/// call to `cached_in` or `layer` adding a new outermost tier:
///
/// ```text
/// FetcherChain::terminal(key, remote)   remote
///     .cached_in(sqlite)                sqlite -> remote
///     .cached_in(redis)                 redis -> sqlite -> remote
///     .build()
/// ```
///
/// Existing tiers never need to know about the ones added around them.

use crate::credential::{
    store::CredentialStore, CodeFetcher, CredentialKey, LocalCachingFetcher,
};
use std::sync::Arc;

/// Builds a decorator around the chain assembled so far
pub type TierFactory = Box<dyn FnOnce(Arc<dyn CodeFetcher>) -> Arc<dyn CodeFetcher> + Send>;

/// One tier in a fetcher chain
pub enum ChainTier {
    /// Read-through, write-through persistent store
    Persistent(Arc<dyn CredentialStore>),
    /// Any other decorator
    Custom(TierFactory),
}

impl ChainTier {
    fn wrap(self, key: &CredentialKey, inner: Arc<dyn CodeFetcher>) -> Arc<dyn CodeFetcher> {
        match self {
            ChainTier::Persistent(store) => {
                Arc::new(LocalCachingFetcher::new(key.clone(), store, inner))
            }
            ChainTier::Custom(factory) => factory(inner),
        }
    }
}

/// Ordered list of tiers over a terminal fetcher
pub struct FetcherChain {
    key: CredentialKey,
    terminal: Arc<dyn CodeFetcher>,
    // Innermost first
    tiers: Vec<ChainTier>,
}

impl FetcherChain {
    /// Start a chain at the fetcher that goes to the network
    pub fn terminal(key: CredentialKey, fetcher: Arc<dyn CodeFetcher>) -> Self {
        Self {
            key,
            terminal: fetcher,
            tiers: Vec::new(),
        }
    }

    /// Wrap the chain in a persistent caching tier
    pub fn cached_in(self, store: Arc<dyn CredentialStore>) -> Self {
        self.tier(ChainTier::Persistent(store))
    }

    /// Wrap the chain in a custom tier
    pub fn layer<F>(self, factory: F) -> Self
    where
        F: FnOnce(Arc<dyn CodeFetcher>) -> Arc<dyn CodeFetcher> + Send + 'static,
    {
        self.tier(ChainTier::Custom(Box::new(factory)))
    }

    /// Wrap the chain in an already-built tier
    pub fn tier(mut self, tier: ChainTier) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    /// Number of fetchers in the chain, terminal included
    pub fn depth(&self) -> usize {
        self.tiers.len() + 1
    }

    /// Fold the tiers, innermost first, into one fetcher
    pub fn build(self) -> Arc<dyn CodeFetcher> {
        let key = self.key;
        self.tiers
            .into_iter()
            .fold(self.terminal, |inner, tier| tier.wrap(&key, inner))
    }
}
