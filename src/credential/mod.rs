/// Backup Credential Resolution
///
/// Obtains and caches the bearer token one vault node presents to another
/// when running a cross-node backup. Tokens flow through three tiers:
/// resolver memory, a persistent credential store, and the network
/// authorization handshake.

pub mod chain;
pub mod inflight;
pub mod local;
pub mod remote;
pub mod resolver;
pub mod store;

pub use chain::{ChainTier, FetcherChain};
pub use inflight::PendingFetches;
pub use local::LocalCachingFetcher;
pub use remote::RemoteCredentialFetcher;
pub use resolver::CredentialResolver;
pub use store::CredentialStore;

use crate::error::VaultResult;
use async_trait::async_trait;
use std::fmt;

/// Identifier of the credential scope, one per target service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialKey(String);

impl CredentialKey {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque bearer credential
///
/// The contents are never interpreted and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Capability to produce a token for one credential key
///
/// Implementations are either terminal (they go to the network) or
/// decorators that wrap exactly one inner fetcher.
#[async_trait]
pub trait CodeFetcher: Send + Sync {
    /// Produce a token, from a cache tier or the network
    async fn fetch(&self) -> VaultResult<Token>;

    /// Drop any cached state for this key, here and in every inner tier
    ///
    /// Idempotent. Having nothing to drop is not an error.
    async fn invalidate(&self) -> VaultResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("eyJhbGciOiJFUzI1NiJ9.secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert_eq!(debug, "Token(<27 bytes>)");
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(Token::from("T1").bearer(), "Bearer T1");
    }

    #[test]
    fn test_key_display() {
        let key = CredentialKey::from("vault-backup-nodeB");
        assert_eq!(key.to_string(), "vault-backup-nodeB");
        assert_eq!(key.as_str(), "vault-backup-nodeB");
    }
}
