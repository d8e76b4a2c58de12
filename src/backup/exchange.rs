/// Authorization exchange with the target vault node
use crate::{
    config::AuthorizationConfig,
    credential::Token,
    error::{VaultError, VaultResult},
    identity::ServiceIdentity,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Asks a target node to issue a token for the calling node
#[async_trait]
pub trait AuthorizationExchange: Send + Sync {
    async fn request_authorization(
        &self,
        caller: &ServiceIdentity,
        target_service_did: &str,
        target_address: &str,
    ) -> VaultResult<Token>;
}

/// Authorization request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub caller_did: String,
    pub target_did: String,
}

/// Authorization response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub token: String,
}

/// Path of the authorization endpoint on a vault node
pub const AUTHORIZATION_PATH: &str = "/api/v2/backup/authorization";

/// HTTP implementation of the authorization exchange
///
/// No retries: a failed exchange is reported once and the outer request
/// layer decides whether to try again.
#[derive(Clone)]
pub struct HttpAuthorizationExchange {
    http_client: Client,
}

impl HttpAuthorizationExchange {
    /// Create a new HTTP exchange
    pub fn new(config: &AuthorizationConfig) -> VaultResult<Self> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VaultError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl AuthorizationExchange for HttpAuthorizationExchange {
    async fn request_authorization(
        &self,
        caller: &ServiceIdentity,
        target_service_did: &str,
        target_address: &str,
    ) -> VaultResult<Token> {
        let url = format!(
            "{}{}",
            target_address.trim_end_matches('/'),
            AUTHORIZATION_PATH
        );
        debug!("Requesting backup authorization from {}", url);

        let request = AuthorizationRequest {
            caller_did: caller.did.clone(),
            target_did: target_service_did.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to connect to target node: {}", e);
                VaultError::Authorization(format!("Failed to reach target node: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            warn!("Target node {} refused authorization: {}", target_service_did, status);
            return Err(VaultError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            warn!("Target node returned non-success status: {}", status);
            return Err(VaultError::Authorization(format!(
                "Target node returned error: {}",
                status
            )));
        }

        let body: AuthorizationResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse authorization response: {}", e);
            VaultError::Authorization(format!("Invalid authorization response: {}", e))
        })?;

        if body.token.is_empty() {
            return Err(VaultError::Rejected {
                status: status.as_u16(),
                message: "Target node issued an empty token".to_string(),
            });
        }

        info!("Obtained backup authorization from {}", target_service_did);
        Ok(Token::new(body.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = AuthorizationRequest {
            caller_did: "did:elastos:nodeA".to_string(),
            target_did: "did:elastos:nodeB".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["caller_did"], "did:elastos:nodeA");
        assert_eq!(json["target_did"], "did:elastos:nodeB");
    }

    #[test]
    fn test_response_requires_token() {
        let parsed: Result<AuthorizationResponse, _> = serde_json::from_str(r#"{"jwt":"x"}"#);
        assert!(parsed.is_err());
    }
}
