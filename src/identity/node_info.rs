/// Service identity lookup through the local node's info endpoint
use crate::{
    config::AuthorizationConfig,
    error::{VaultError, VaultResult},
    identity::{ServiceIdentity, ServiceIdentityProvider},
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Node info response from a vault node
#[derive(Debug, Deserialize)]
struct NodeInfoResponse {
    service_did: String,
}

/// Resolves the service DID by asking the node that owns this connection
///
/// Nothing is cached here; every call is one request.
#[derive(Clone)]
pub struct NodeInfoIdentity {
    provider_address: String,
    http_client: reqwest::Client,
}

impl NodeInfoIdentity {
    /// Create a new node-info identity provider
    pub fn new(provider_address: impl Into<String>, config: &AuthorizationConfig) -> VaultResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VaultError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider_address: provider_address.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn node_info_url(&self) -> String {
        format!("{}/api/v2/node/info", self.provider_address)
    }
}

#[async_trait]
impl ServiceIdentityProvider for NodeInfoIdentity {
    async fn resolve_own_service_identity(&self) -> VaultResult<ServiceIdentity> {
        let url = self.node_info_url();
        debug!("Fetching node info: {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!("Failed to reach node info endpoint: {}", e);
            VaultError::IdentityResolution(format!("Failed to fetch node info: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(VaultError::IdentityResolution(format!(
                "Node info returned error: {}",
                response.status()
            )));
        }

        let info: NodeInfoResponse = response.json().await.map_err(|e| {
            VaultError::IdentityResolution(format!("Invalid node info response: {}", e))
        })?;

        ServiceIdentity::new(info.service_did)
    }
}
