/// Service Identity Resolution
///
/// Resolves the DID the local vault node presents to other nodes when it
/// asks them for a backup credential.

pub mod node_info;

pub use node_info::NodeInfoIdentity;

use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verifiable identity of a vault service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub did: String,
}

impl ServiceIdentity {
    /// Build an identity, rejecting anything that is not a DID
    pub fn new(did: impl Into<String>) -> VaultResult<Self> {
        let did = did.into();
        if !is_did(&did) {
            return Err(VaultError::IdentityResolution(format!(
                "Not a DID: {}",
                did
            )));
        }
        Ok(Self { did })
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.did)
    }
}

/// `did:<method>:<id>` with non-empty method and id
fn is_did(s: &str) -> bool {
    let mut parts = s.splitn(3, ':');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty()
    )
}

/// Resolves the local node's own service identity
#[async_trait]
pub trait ServiceIdentityProvider: Send + Sync {
    async fn resolve_own_service_identity(&self) -> VaultResult<ServiceIdentity>;
}

/// Identity fixed by configuration
#[derive(Debug, Clone)]
pub struct StaticServiceIdentity {
    identity: ServiceIdentity,
}

impl StaticServiceIdentity {
    pub fn new(did: impl Into<String>) -> VaultResult<Self> {
        Ok(Self {
            identity: ServiceIdentity::new(did)?,
        })
    }
}

#[async_trait]
impl ServiceIdentityProvider for StaticServiceIdentity {
    async fn resolve_own_service_identity(&self) -> VaultResult<ServiceIdentity> {
        Ok(self.identity.clone())
    }
}
