/// Terminal fetcher: runs the network authorization handshake
use crate::{
    backup::{AuthorizationContext, AuthorizationExchange},
    credential::{CodeFetcher, Token},
    error::{VaultError, VaultResult},
    metrics,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches a fresh token from the target node on every call
#[derive(Clone)]
pub struct RemoteCredentialFetcher {
    context: AuthorizationContext,
    exchange: Arc<dyn AuthorizationExchange>,
}

impl RemoteCredentialFetcher {
    pub fn new(context: AuthorizationContext, exchange: Arc<dyn AuthorizationExchange>) -> Self {
        Self { context, exchange }
    }

    pub fn context(&self) -> &AuthorizationContext {
        &self.context
    }

    async fn handshake(&self) -> VaultResult<Token> {
        let caller = self.context.caller().resolve_own_service_identity().await?;
        debug!(
            "Requesting backup credential for {} from {}",
            caller,
            self.context.target_service_did()
        );

        self.exchange
            .request_authorization(
                &caller,
                self.context.target_service_did(),
                self.context.target_address(),
            )
            .await
    }
}

#[async_trait]
impl CodeFetcher for RemoteCredentialFetcher {
    async fn fetch(&self) -> VaultResult<Token> {
        match self.handshake().await {
            Ok(token) => {
                metrics::record_network_fetch(true);
                Ok(token)
            }
            Err(e) => {
                metrics::record_network_fetch(false);
                warn!(
                    "Failed to create backup credential for {}: {}",
                    self.context.target_service_did(),
                    e
                );
                if e.is_authorization_failure() {
                    return Err(e);
                }
                Err(VaultError::Authorization(format!(
                    "Failed to create backup credential: {}",
                    e
                )))
            }
        }
    }

    async fn invalidate(&self) -> VaultResult<()> {
        // Holds no state; the next fetch always runs the handshake
        Ok(())
    }
}
