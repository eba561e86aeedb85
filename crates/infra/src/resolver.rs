//! Barcode resolution pipeline (read-through, retry, write-back).
//!
//! ```text
//! barcode
//!   ↓
//! 1. Validate (blank → BadInput, no store or remote access)
//!   ↓
//! 2. LocalStore::get → hit: Found (zero remote calls)
//!   ↓ miss
//! 3. RetryPolicy::execute(RemoteLookupClient::fetch)
//!   ↓ payload                         ↓ nothing / retries exhausted
//! 4. upsert_product, then             NotFound
//!    insert_barcode_if_absent
//!   ↓
//! Created
//! ```
//!
//! The local read strictly precedes any remote call, and persistence strictly
//! follows a successful one. Two concurrent first resolutions of the same
//! barcode may both reach step 4; the store's atomic upsert and insert-or-ignore
//! leave exactly one product/barcode pair behind.

use std::net::IpAddr;

use thiserror::Error;
use tracing::instrument;

use foodscan_core::{BarcodeValue, DomainError};
use foodscan_products::{ResolutionResult, Statistics, derive_product};

use crate::external::{RemoteLookupClient, RemoteLookupError};
use crate::retry::RetryPolicy;
use crate::store::{LocalStore, StoreError};

/// Failure of a resolution-engine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Empty or blank barcode.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Delete target does not exist.
    #[error("barcode not found")]
    NotFound,

    /// Caller is outside the trust boundary for destructive operations.
    #[error("forbidden")]
    Forbidden,

    /// Remote payload present but semantically empty.
    #[error("invalid remote payload: {0}")]
    Format(String),

    /// Non-retryable remote failure other than "no such product".
    #[error("remote lookup failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ResolveError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => ResolveError::NotFound,
            other => ResolveError::Store(other),
        }
    }
}

impl From<DomainError> for ResolveError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ResolveError::BadInput(msg),
            DomainError::InvalidFormat(msg) => ResolveError::Format(msg),
            DomainError::NotFound => ResolveError::NotFound,
            DomainError::Forbidden => ResolveError::Forbidden,
        }
    }
}

impl From<RemoteLookupError> for ResolveError {
    fn from(value: RemoteLookupError) -> Self {
        match value {
            RemoteLookupError::Format(msg) => ResolveError::Format(msg),
            other => ResolveError::Remote(other.to_string()),
        }
    }
}

/// Network origin of the caller of a restricted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerOrigin {
    pub addr: IpAddr,
}

impl CallerOrigin {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }

    /// Only callers on the local host may delete mappings.
    pub fn is_trusted(&self) -> bool {
        match self.addr {
            IpAddr::V4(v4) => v4.is_loopback(),
            IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
        }
    }
}

impl From<IpAddr> for CallerOrigin {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

/// Read-through/write-back resolver over a local store and a remote lookup.
///
/// Holds no per-request state; clone the store/remote handles (e.g. `Arc`) to
/// share one engine across tasks.
pub struct ResolutionEngine<S, R> {
    store: S,
    remote: R,
    policy: RetryPolicy,
}

impl<S, R> ResolutionEngine<S, R>
where
    S: LocalStore,
    R: RemoteLookupClient,
{
    pub fn new(store: S, remote: R, policy: RetryPolicy) -> Self {
        Self {
            store,
            remote,
            policy,
        }
    }

    /// Resolve `raw` to a product, consulting the remote only on a local miss.
    #[instrument(skip_all, fields(barcode = %raw), err(level = "debug"))]
    pub async fn resolve(&self, raw: &str) -> Result<ResolutionResult, ResolveError> {
        let barcode = BarcodeValue::parse(raw)?;

        if let Some(product) = self.store.get(&barcode).await? {
            tracing::debug!(sku = %product.sku(), "local hit");
            return Ok(ResolutionResult::Found(product));
        }

        let fetched = self
            .policy
            .execute(|| self.remote.fetch(&barcode), RemoteLookupError::retry_class)
            .await;

        let payload = match fetched {
            Ok(Some(Some(payload))) => payload,
            Ok(Some(None)) | Ok(None) => {
                tracing::info!("barcode unknown remotely");
                return Ok(ResolutionResult::NotFound);
            }
            Err(RemoteLookupError::Client { status: 404 }) => {
                tracing::info!("remote reported no such product");
                return Ok(ResolutionResult::NotFound);
            }
            Err(RemoteLookupError::Format(msg)) => {
                tracing::error!(error = %msg, "remote returned an unusable payload");
                return Err(ResolveError::Format(msg));
            }
            Err(other) => return Err(other.into()),
        };

        let derived = derive_product(&barcode, &payload);

        // Product row first: the barcode row references it.
        self.store
            .upsert_product(derived.sku(), derived.name())
            .await?;
        let inserted = self
            .store
            .insert_barcode_if_absent(&barcode, derived.sku())
            .await?;

        if !inserted {
            tracing::debug!(sku = %derived.sku(), "barcode already mapped by a concurrent resolution");
        }

        let product = self.store.get(&barcode).await?.unwrap_or(derived);
        tracing::info!(sku = %product.sku(), "resolved remotely and persisted");
        Ok(ResolutionResult::Created(product))
    }

    /// Remove a single barcode mapping. Trust is checked before anything else.
    #[instrument(skip_all, fields(barcode = %raw, origin = %origin.addr), err(level = "debug"))]
    pub async fn delete_barcode(&self, raw: &str, origin: CallerOrigin) -> Result<(), ResolveError> {
        if !origin.is_trusted() {
            tracing::warn!("delete rejected for untrusted caller");
            return Err(ResolveError::Forbidden);
        }

        let barcode = BarcodeValue::parse(raw)?;

        if !self.store.exists_barcode(&barcode).await? {
            return Err(ResolveError::NotFound);
        }
        self.store.delete_barcode(&barcode).await?;
        tracing::info!("barcode mapping deleted");
        Ok(())
    }

    /// Passthrough to the store; `None` means the store is unreachable.
    pub async fn statistics(&self) -> Option<Statistics> {
        self.store.statistics().await
    }

    pub async fn store_reachable(&self) -> bool {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use foodscan_core::Sku;
    use foodscan_products::{ExternalPayload, Product};

    use crate::store::InMemoryLocalStore;

    type Outcome = Result<Option<ExternalPayload>, RemoteLookupError>;

    /// Remote that replays scripted outcomes, then repeats `fallback`.
    struct ScriptedRemote {
        script: Mutex<VecDeque<Outcome>>,
        fallback: Outcome,
        calls: AtomicU32,
    }

    impl ScriptedRemote {
        fn new(script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            })
        }

        fn always(outcome: Outcome) -> Arc<Self> {
            Self::new(vec![], outcome)
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteLookupClient for ScriptedRemote {
        async fn fetch(&self, _barcode: &BarcodeValue) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent resolutions interleave at the remote call.
            tokio::task::yield_now().await;
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn payload(name: &str, quantity: &str) -> ExternalPayload {
        ExternalPayload {
            product_name: Some(name.to_string()),
            quantity: Some(quantity.to_string()),
            ..Default::default()
        }
    }

    fn server_error() -> RemoteLookupError {
        RemoteLookupError::Server { status: 503 }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(attempts, Duration::ZERO)
    }

    fn engine(
        store: Arc<InMemoryLocalStore>,
        remote: Arc<ScriptedRemote>,
        attempts: u32,
    ) -> ResolutionEngine<Arc<InMemoryLocalStore>, Arc<ScriptedRemote>> {
        ResolutionEngine::new(store, remote, fast_policy(attempts))
    }

    fn seeded() -> Arc<InMemoryLocalStore> {
        let product = Product::new(
            Sku::parse("SKU_333931").unwrap(),
            "Seeded Milk 1l",
            vec![BarcodeValue::parse("4006381333931").unwrap()],
        );
        Arc::new(InMemoryLocalStore::with_seed([product]))
    }

    fn local() -> CallerOrigin {
        CallerOrigin::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn remote_caller() -> CallerOrigin {
        CallerOrigin::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)))
    }

    #[test]
    fn loopback_origins_are_trusted() {
        assert!(local().is_trusted());
        assert!(CallerOrigin::new(IpAddr::V6(Ipv6Addr::LOCALHOST)).is_trusted());
        assert!(
            CallerOrigin::new(IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped())).is_trusted()
        );
        assert!(!remote_caller().is_trusted());
    }

    #[tokio::test]
    async fn local_hit_makes_no_remote_call() {
        let remote = ScriptedRemote::always(Ok(Some(payload("Other", ""))));
        let engine = engine(seeded(), remote.clone(), 3);

        let result = engine.resolve("4006381333931").await.unwrap();

        match result {
            ResolutionResult::Found(p) => assert_eq!(p.name(), "Seeded Milk 1l"),
            other => panic!("expected Found, got {other:?}"),
        }
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn blank_barcode_is_rejected_before_any_lookup() {
        let store = Arc::new(InMemoryLocalStore::new());
        // An unreachable store would fail any access; BadInput proves none happened.
        store.set_reachable(false);
        let remote = ScriptedRemote::always(Ok(None));
        let engine = engine(store, remote.clone(), 3);

        assert!(matches!(engine.resolve("").await, Err(ResolveError::BadInput(_))));
        assert!(matches!(engine.resolve("   ").await, Err(ResolveError::BadInput(_))));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn remote_hit_is_written_back() {
        let store = Arc::new(InMemoryLocalStore::new());
        let remote = ScriptedRemote::always(Ok(Some(payload("Choco", "100g"))));
        let engine = engine(store.clone(), remote.clone(), 3);

        let first = engine.resolve("5449000000996").await.unwrap();
        let ResolutionResult::Created(product) = first else {
            panic!("expected Created, got {first:?}");
        };
        assert_eq!(product.sku().as_str(), "SKU_000996");
        assert_eq!(product.name(), "Choco 100g");
        assert_eq!(product.barcodes().len(), 1);

        let second = engine.resolve("5449000000996").await.unwrap();
        assert!(matches!(second, ResolutionResult::Found(_)));
        assert_eq!(remote.calls(), 1);

        let stats = engine.statistics().await.unwrap();
        assert_eq!(stats, Statistics { barcodes_count: 1, sku_count: 1 });
    }

    #[tokio::test]
    async fn remote_miss_is_not_found_and_persists_nothing() {
        let store = Arc::new(InMemoryLocalStore::new());
        let remote = ScriptedRemote::always(Ok(None));
        let engine = engine(store.clone(), remote.clone(), 3);

        assert_eq!(engine.resolve("123").await.unwrap(), ResolutionResult::NotFound);
        assert_eq!(remote.calls(), 1);
        assert_eq!(engine.statistics().await.unwrap().barcodes_count, 0);
    }

    #[tokio::test]
    async fn remote_404_is_not_found_without_retry() {
        let remote = ScriptedRemote::always(Err(RemoteLookupError::Client { status: 404 }));
        let engine = engine(Arc::new(InMemoryLocalStore::new()), remote.clone(), 3);

        assert_eq!(engine.resolve("123").await.unwrap(), ResolutionResult::NotFound);
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn other_client_errors_surface_without_retry() {
        let remote = ScriptedRemote::always(Err(RemoteLookupError::Client { status: 400 }));
        let engine = engine(Arc::new(InMemoryLocalStore::new()), remote.clone(), 3);

        assert!(matches!(engine.resolve("123").await, Err(ResolveError::Remote(_))));
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_server_errors_degrade_to_not_found() {
        let store = Arc::new(InMemoryLocalStore::new());
        let remote = ScriptedRemote::always(Err(server_error()));
        let engine = engine(store.clone(), remote.clone(), 3);

        assert_eq!(engine.resolve("123").await.unwrap(), ResolutionResult::NotFound);
        assert_eq!(remote.calls(), 3);
        assert!(!store.exists_barcode(&BarcodeValue::parse("123").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn transport_errors_are_retried() {
        let remote = ScriptedRemote::new(
            vec![Err(RemoteLookupError::Transport("timeout".into()))],
            Ok(Some(payload("Tea", ""))),
        );
        let engine = engine(Arc::new(InMemoryLocalStore::new()), remote.clone(), 3);

        assert!(matches!(engine.resolve("42").await.unwrap(), ResolutionResult::Created(_)));
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn three_server_errors_then_success_creates_within_one_request() {
        let remote = ScriptedRemote::new(
            vec![Err(server_error()), Err(server_error()), Err(server_error())],
            Ok(Some(payload("Juice", "1l"))),
        );
        let engine = engine(Arc::new(InMemoryLocalStore::new()), remote.clone(), 4);

        let result = engine.resolve("9876543210").await.unwrap();

        assert!(matches!(result, ResolutionResult::Created(ref p) if p.name() == "Juice 1l"));
        assert_eq!(remote.calls(), 4);
    }

    #[tokio::test]
    async fn empty_payload_is_a_format_error_and_not_retried() {
        let store = Arc::new(InMemoryLocalStore::new());
        let remote = ScriptedRemote::always(Err(RemoteLookupError::Format(
            "empty product name".into(),
        )));
        let engine = engine(store.clone(), remote.clone(), 3);

        assert_eq!(
            engine.resolve("123").await,
            Err(ResolveError::Format("empty product name".into()))
        );
        assert_eq!(remote.calls(), 1);
        assert_eq!(engine.statistics().await.unwrap().barcodes_count, 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(InMemoryLocalStore::new());
        store.set_reachable(false);
        let remote = ScriptedRemote::always(Ok(None));
        let engine = engine(store, remote.clone(), 3);

        assert!(matches!(
            engine.resolve("123").await,
            Err(ResolveError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_first_resolutions_persist_one_pair() {
        let store = Arc::new(InMemoryLocalStore::new());
        let remote = ScriptedRemote::always(Ok(Some(payload("Soda", "330ml"))));
        let engine = Arc::new(engine(store.clone(), remote.clone(), 3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.resolve("7622210449283").await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            let product = result.product().expect("resolved product");
            assert_eq!(product.sku().as_str(), "SKU_449283");
        }

        let stats = engine.statistics().await.unwrap();
        assert_eq!(stats, Statistics { barcodes_count: 1, sku_count: 1 });
    }

    #[tokio::test]
    async fn delete_requires_trusted_origin() {
        let store = seeded();
        let engine = engine(store.clone(), ScriptedRemote::always(Ok(None)), 3);

        assert_eq!(
            engine.delete_barcode("4006381333931", remote_caller()).await,
            Err(ResolveError::Forbidden)
        );
        // Forbidden wins even over bad input.
        assert_eq!(engine.delete_barcode("", remote_caller()).await, Err(ResolveError::Forbidden));
        assert!(store.exists_barcode(&BarcodeValue::parse("4006381333931").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_mapping_only() {
        let store = seeded();
        let engine = engine(store.clone(), ScriptedRemote::always(Ok(None)), 3);
        let barcode = BarcodeValue::parse("4006381333931").unwrap();

        engine.delete_barcode("4006381333931", local()).await.unwrap();

        assert!(!store.exists_barcode(&barcode).await.unwrap());
        assert!(
            store
                .find_by_sku(&Sku::parse("SKU_333931").unwrap())
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(
            engine.delete_barcode("4006381333931", local()).await,
            Err(ResolveError::NotFound)
        );
    }

    #[tokio::test]
    async fn delete_of_unknown_or_blank_barcode() {
        let engine = engine(
            Arc::new(InMemoryLocalStore::new()),
            ScriptedRemote::always(Ok(None)),
            3,
        );

        assert_eq!(engine.delete_barcode("999", local()).await, Err(ResolveError::NotFound));
        assert!(matches!(
            engine.delete_barcode(" ", local()).await,
            Err(ResolveError::BadInput(_))
        ));
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn expected_outcomes_are_not_logged_as_errors() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let remote = ScriptedRemote::always(Err(RemoteLookupError::Client { status: 404 }));
        let resolver = engine(seeded(), remote, 3);

        assert!(matches!(resolver.resolve(" ").await, Err(ResolveError::BadInput(_))));
        assert_eq!(resolver.resolve("123").await.unwrap(), ResolutionResult::NotFound);
        assert_eq!(
            resolver.delete_barcode("4006381333931", remote_caller()).await,
            Err(ResolveError::Forbidden)
        );
        assert_eq!(resolver.delete_barcode("999", local()).await, Err(ResolveError::NotFound));

        assert_eq!(logs.text(), "");

        // An unusable remote payload is a real failure and does reach ERROR.
        let remote = ScriptedRemote::always(Err(RemoteLookupError::Format(
            "empty product name".into(),
        )));
        let resolver = engine(Arc::new(InMemoryLocalStore::new()), remote, 3);
        assert!(resolver.resolve("123").await.is_err());
        assert!(logs.text().contains("unusable payload"));
    }

    #[tokio::test]
    async fn statistics_absent_when_store_unreachable() {
        let store = seeded();
        let engine = engine(store.clone(), ScriptedRemote::always(Ok(None)), 3);
        assert!(engine.store_reachable().await);

        store.set_reachable(false);
        assert!(engine.statistics().await.is_none());
        assert!(!engine.store_reachable().await);
    }
}
