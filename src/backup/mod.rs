/// Cross-node backup authorization
///
/// Describes the node a backup is sent to and how the local node asks it
/// for a credential:
/// - `BackupContext` carries the caller-supplied backup parameters
/// - `AuthorizationContext` is the immutable view the handshake needs
/// - `exchange` performs the authorization request over HTTP
/// - `reject` is the hook the REST layer calls on a rejected token

pub mod exchange;
pub mod reject;

pub use exchange::{AuthorizationExchange, HttpAuthorizationExchange};

use crate::{
    credential::CredentialKey,
    error::{VaultError, VaultResult},
    identity::ServiceIdentityProvider,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parameter naming the target node's service DID
pub const TARGET_SERVICE_DID: &str = "targetServiceDid";

/// Parameter naming the target node's address
pub const TARGET_ADDRESS: &str = "targetAddress";

/// Backup parameters supplied by the application
#[derive(Debug, Clone, Default)]
pub struct BackupContext {
    backup_type: String,
    parameters: HashMap<String, String>,
}

impl BackupContext {
    pub fn new(backup_type: impl Into<String>) -> Self {
        Self {
            backup_type: backup_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Context for a vault-to-vault backup
    pub fn for_target(target_service_did: &str, target_address: &str) -> Self {
        Self::new("hive_node")
            .with_parameter(TARGET_SERVICE_DID, target_service_did)
            .with_parameter(TARGET_ADDRESS, target_address)
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn backup_type(&self) -> &str {
        &self.backup_type
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> VaultResult<&str> {
        self.parameter(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VaultError::Validation(format!("Missing backup parameter: {}", name)))
    }
}

/// Everything the remote handshake needs, fixed for a resolver's lifetime
#[derive(Clone)]
pub struct AuthorizationContext {
    caller: Arc<dyn ServiceIdentityProvider>,
    target_service_did: String,
    target_address: String,
}

impl AuthorizationContext {
    pub fn new(
        caller: Arc<dyn ServiceIdentityProvider>,
        target_service_did: impl Into<String>,
        target_address: impl Into<String>,
    ) -> Self {
        Self {
            caller,
            target_service_did: target_service_did.into(),
            target_address: target_address.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from backup parameters
    pub fn from_backup_context(
        caller: Arc<dyn ServiceIdentityProvider>,
        context: &BackupContext,
    ) -> VaultResult<Self> {
        let target_service_did = context.required(TARGET_SERVICE_DID)?;
        let target_address = context.required(TARGET_ADDRESS)?;
        Ok(Self::new(caller, target_service_did, target_address))
    }

    pub fn caller(&self) -> &Arc<dyn ServiceIdentityProvider> {
        &self.caller
    }

    pub fn target_service_did(&self) -> &str {
        &self.target_service_did
    }

    pub fn target_address(&self) -> &str {
        &self.target_address
    }

    /// Credentials are scoped to the target service
    pub fn credential_key(&self) -> CredentialKey {
        CredentialKey::new(self.target_service_did.clone())
    }
}

impl fmt::Debug for AuthorizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationContext")
            .field("target_service_did", &self.target_service_did)
            .field("target_address", &self.target_address)
            .finish_non_exhaustive()
    }
}
