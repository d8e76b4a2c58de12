/// Vault Credential - backup credential resolution for vault nodes
///
/// Obtains and maintains the bearer token one vault node presents to
/// another when it sends a cross-node backup, caching it in memory and in a
/// persistent store and refreshing it through the network authorization
/// handshake when the target rejects it.

pub mod backup;
pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod metrics;

pub use backup::{AuthorizationContext, BackupContext};
pub use config::CredentialConfig;
pub use credential::{CodeFetcher, CredentialKey, CredentialResolver, Token};
pub use error::{VaultError, VaultResult};
