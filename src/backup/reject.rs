/// Hooks for the outbound request layer
///
/// The request layer attaches the resolver's token before every cross-node
/// call and reports each response status back. A 401 means the target no
/// longer accepts the token, so every cache tier is cleared.

use crate::{
    credential::CredentialResolver,
    error::{VaultError, VaultResult},
};
use reqwest::{header::AUTHORIZATION, RequestBuilder, StatusCode};
use tracing::warn;

/// What happened after a response status was observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The token was not rejected
    Accepted,
    /// The token was rejected and every tier cleared
    Invalidated,
    /// The token was rejected; memory was cleared but a deeper tier failed
    InvalidatedWithWarning(VaultError),
}

impl ResponseOutcome {
    /// Whether the caller should fetch a new token before retrying
    pub fn token_rejected(&self) -> bool {
        !matches!(self, ResponseOutcome::Accepted)
    }
}

/// Attach `Authorization: Bearer <token>` to an outgoing request
pub async fn authorize(
    resolver: &CredentialResolver,
    request: RequestBuilder,
) -> VaultResult<RequestBuilder> {
    let token = resolver.get_token().await?;
    Ok(request.header(AUTHORIZATION, token.bearer()))
}

/// Report a response status for a request sent with the resolver's token
pub async fn observe_response(resolver: &CredentialResolver, status: StatusCode) -> ResponseOutcome {
    if status != StatusCode::UNAUTHORIZED {
        return ResponseOutcome::Accepted;
    }

    warn!("Backup credential for {} was rejected by the target", resolver.key());
    match resolver.invalidate_token().await {
        Ok(()) => ResponseOutcome::Invalidated,
        Err(e) => ResponseOutcome::InvalidatedWithWarning(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{
        store::MemoryCredentialStore, CodeFetcher, CredentialKey, FetcherChain, Token,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingNetwork(AtomicUsize);

    #[async_trait]
    impl CodeFetcher for CountingNetwork {
        async fn fetch(&self) -> VaultResult<Token> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Token::new(format!("T{}", n)))
        }

        async fn invalidate(&self) -> VaultResult<()> {
            Ok(())
        }
    }

    fn setup() -> (CredentialResolver, MemoryCredentialStore, Arc<CountingNetwork>) {
        let network = Arc::new(CountingNetwork(AtomicUsize::new(0)));
        let store = MemoryCredentialStore::new();
        let chain = FetcherChain::terminal(CredentialKey::from("did:elastos:nodeB"), network.clone())
            .cached_in(Arc::new(store.clone()));
        (CredentialResolver::from_chain(chain), store, network)
    }

    #[tokio::test]
    async fn test_authorize_sets_bearer_header() {
        let (resolver, _store, _network) = setup();
        let client = reqwest::Client::new();

        let request = authorize(&resolver, client.get("http://node-b.example.com/api/v2/vault"))
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer T1"
        );
    }

    #[tokio::test]
    async fn test_success_status_keeps_token() {
        let (resolver, _store, _network) = setup();
        resolver.get_token().await.unwrap();

        let outcome = observe_response(&resolver, StatusCode::OK).await;
        assert_eq!(outcome, ResponseOutcome::Accepted);
        assert!(!outcome.token_rejected());
        assert!(resolver.cached_token().is_some());

        // Forbidden is a permission problem, not a stale token
        observe_response(&resolver, StatusCode::FORBIDDEN).await;
        assert!(resolver.cached_token().is_some());
    }

    #[tokio::test]
    async fn test_unauthorized_clears_all_tiers() {
        let (resolver, store, network) = setup();
        resolver.get_token().await.unwrap();

        let outcome = observe_response(&resolver, StatusCode::UNAUTHORIZED).await;
        assert_eq!(outcome, ResponseOutcome::Invalidated);
        assert!(resolver.cached_token().is_none());
        assert!(store.is_empty().await);

        assert_eq!(resolver.get_token().await.unwrap(), Token::from("T2"));
        assert_eq!(network.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_is_a_warning() {
        let (resolver, store, _network) = setup();
        resolver.get_token().await.unwrap();
        store.set_failing(true);

        let outcome = observe_response(&resolver, StatusCode::UNAUTHORIZED).await;
        assert!(matches!(
            outcome,
            ResponseOutcome::InvalidatedWithWarning(VaultError::Storage(_))
        ));
        assert!(outcome.token_rejected());
        assert!(resolver.cached_token().is_none());
    }
}
