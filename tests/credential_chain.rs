/// Credential chain scenarios
/// Resolver, fetcher chain and persistent store exercised together with a
/// fake authorization exchange standing in for the target node
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vault_credential::{
    backup::{AuthorizationContext, AuthorizationExchange},
    credential::{
        store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore},
        FetcherChain, RemoteCredentialFetcher,
    },
    db,
    identity::{ServiceIdentity, StaticServiceIdentity},
    CredentialKey, CredentialResolver, Token, VaultError, VaultResult,
};

const KEY: &str = "vault-backup-nodeB";

/// Target node double: issues T1, T2, ... and can be taken offline
struct FakeTargetNode {
    requests: AtomicUsize,
    offline: AtomicBool,
    latency: Duration,
}

impl FakeTargetNode {
    fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            requests: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            latency,
        })
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthorizationExchange for FakeTargetNode {
    async fn request_authorization(
        &self,
        caller: &ServiceIdentity,
        target_service_did: &str,
        _target_address: &str,
    ) -> VaultResult<Token> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(VaultError::Authorization("connection refused".to_string()));
        }

        assert_eq!(caller.did, "did:elastos:nodeA");
        assert_eq!(target_service_did, "did:elastos:nodeB");
        Ok(Token::new(format!("T{}", n)))
    }
}

fn resolver_over(
    network: Arc<FakeTargetNode>,
    store: Arc<dyn CredentialStore>,
) -> CredentialResolver {
    let caller = Arc::new(StaticServiceIdentity::new("did:elastos:nodeA").unwrap());
    let context = AuthorizationContext::new(caller, "did:elastos:nodeB", "https://node-b.example.com");
    let remote = Arc::new(RemoteCredentialFetcher::new(context, network));

    CredentialResolver::from_chain(
        FetcherChain::terminal(CredentialKey::from(KEY), remote).cached_in(store),
    )
}

#[tokio::test]
async fn test_backup_credential_lifecycle() {
    let network = FakeTargetNode::new(Duration::ZERO);
    let store = MemoryCredentialStore::new();
    let resolver = resolver_over(network.clone(), Arc::new(store.clone()));
    let key = CredentialKey::from(KEY);

    // Empty everywhere: one network call, written through
    assert_eq!(resolver.get_token().await.unwrap(), Token::from("T1"));
    assert_eq!(network.requests(), 1);
    assert_eq!(store.load(&key).await.unwrap(), Some(Token::from("T1")));

    // Second call is served from memory
    assert_eq!(resolver.get_token().await.unwrap(), Token::from("T1"));
    assert_eq!(network.requests(), 1);

    // Rejection clears both tiers
    resolver.invalidate_token().await.unwrap();
    assert!(store.load(&key).await.unwrap().is_none());
    assert!(resolver.cached_token().is_none());

    // Third call goes back to the network
    assert_eq!(resolver.get_token().await.unwrap(), Token::from("T2"));
    assert_eq!(network.requests(), 2);
}

#[tokio::test]
async fn test_persisted_token_survives_restart_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.sqlite");
    let network = FakeTargetNode::new(Duration::ZERO);

    {
        let pool = db::create_pool(&path, db::DatabaseOptions::default()).await.unwrap();
        let store = SqliteCredentialStore::open(pool).await.unwrap();
        let resolver = resolver_over(network.clone(), Arc::new(store));
        assert_eq!(resolver.get_token().await.unwrap(), Token::from("T1"));
    }

    // New process: memory is empty and the target is unreachable
    network.set_offline(true);
    let pool = db::create_pool(&path, db::DatabaseOptions::default()).await.unwrap();
    let store = SqliteCredentialStore::open(pool).await.unwrap();
    let resolver = resolver_over(network.clone(), Arc::new(store));

    assert_eq!(resolver.get_token().await.unwrap(), Token::from("T1"));
    assert_eq!(network.requests(), 1);
}

#[tokio::test]
async fn test_network_failure_leaves_no_entry() {
    let network = FakeTargetNode::new(Duration::ZERO);
    network.set_offline(true);
    let store = MemoryCredentialStore::new();
    let resolver = resolver_over(network.clone(), Arc::new(store.clone()));

    let err = resolver.get_token().await.unwrap_err();
    assert!(err.is_authorization_failure());
    assert!(resolver.cached_token().is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_concurrent_callers_get_identical_token() {
    let network = FakeTargetNode::new(Duration::from_millis(50));
    let store = MemoryCredentialStore::new();
    let resolver = resolver_over(network.clone(), Arc::new(store.clone()));

    let calls = (0..32).map(|_| {
        let resolver = resolver.clone();
        async move { resolver.get_token().await }
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap(), Token::from("T1"));
    }
    assert_eq!(network.requests(), 1);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_get_identical_failure() {
    let network = FakeTargetNode::new(Duration::from_millis(50));
    network.set_offline(true);
    let resolver = resolver_over(network.clone(), Arc::new(MemoryCredentialStore::new()));

    let (a, b, c) = tokio::join!(resolver.get_token(), resolver.get_token(), resolver.get_token());
    let a = a.unwrap_err();
    assert_eq!(a, b.unwrap_err());
    assert_eq!(a, c.unwrap_err());
    assert_eq!(network.requests(), 1);
}

#[tokio::test]
async fn test_timed_out_caller_does_not_cancel_shared_fetch() {
    let network = FakeTargetNode::new(Duration::from_millis(100));
    let store = MemoryCredentialStore::new();
    let resolver = resolver_over(network.clone(), Arc::new(store.clone()));

    let impatient = tokio::time::timeout(Duration::from_millis(10), resolver.get_token()).await;
    assert!(impatient.is_err());

    // The fetch keeps running and its result lands in both tiers
    let token = resolver.get_token().await.unwrap();
    assert_eq!(token, Token::from("T1"));
    assert_eq!(network.requests(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(resolver.cached_token(), Some(Token::from("T1")));
    assert_eq!(
        store.load(&CredentialKey::from(KEY)).await.unwrap(),
        Some(Token::from("T1"))
    );
}

#[tokio::test]
async fn test_broken_store_still_yields_network_token() {
    let network = FakeTargetNode::new(Duration::ZERO);
    let store = MemoryCredentialStore::new();
    store.set_failing(true);
    let resolver = resolver_over(network.clone(), Arc::new(store.clone()));

    tokio_test::assert_ok!(resolver.get_token().await);
    assert_eq!(network.requests(), 1);

    // Memory still spares the network on the next call
    resolver.get_token().await.unwrap();
    assert_eq!(network.requests(), 1);
}

#[tokio::test]
async fn test_stores_shared_across_targets() {
    let store = MemoryCredentialStore::new();
    let caller = Arc::new(StaticServiceIdentity::new("did:elastos:nodeA").unwrap());
    let network = FakeTargetNode::new(Duration::ZERO);

    let context_b =
        AuthorizationContext::new(caller.clone(), "did:elastos:nodeB", "https://node-b.example.com");
    let context_c =
        AuthorizationContext::new(caller, "did:elastos:nodeB", "https://node-c.example.com");

    // Same target DID behind two addresses shares one credential key
    let b = CredentialResolver::for_backup(context_b, network.clone(), Arc::new(store.clone()));
    let c = CredentialResolver::for_backup(context_c, network.clone(), Arc::new(store.clone()));
    assert_eq!(b.key(), c.key());

    assert_eq!(b.get_token().await.unwrap(), Token::from("T1"));
    assert_eq!(c.get_token().await.unwrap(), Token::from("T1"));
    assert_eq!(network.requests(), 1);
}
