//! Infrastructure wiring: local store, remote client, and the resolution engine.

use std::sync::Arc;

use thiserror::Error;

use foodscan_infra::{
    AppConfig, HttpClientError, HttpLookupClient, InMemoryLocalStore, LocalStore,
    PostgresLocalStore, RemoteLookupClient, ResolutionEngine, StoreError,
};

/// Startup wiring failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("remote lookup client: {0}")]
    Remote(#[from] HttpClientError),

    #[error("local store: {0}")]
    Store(#[from] StoreError),
}

/// Engine over type-erased adapters so the store backend is a runtime choice.
pub type Engine = ResolutionEngine<Arc<dyn LocalStore>, Arc<dyn RemoteLookupClient>>;

/// Shared services handed to every handler.
pub struct AppServices {
    pub engine: Engine,
    /// Which store backend is active; reported by the health endpoint.
    pub persistent: bool,
}

impl AppServices {
    pub fn new(engine: Engine, persistent: bool) -> Self {
        Self { engine, persistent }
    }

    /// Compose services from already-built adapters (tests, embedding).
    pub fn from_parts(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteLookupClient>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            ResolutionEngine::new(store, remote, config.retry_policy()),
            config.use_persistent_stores,
        )
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    let remote: Arc<dyn RemoteLookupClient> = Arc::new(HttpLookupClient::new(
        &config.external_api_url,
        config.external_timeout,
    )?);

    let store: Arc<dyn LocalStore> = match (config.use_persistent_stores, &config.database_url) {
        (true, Some(url)) => build_persistent_store(url).await?,
        (true, None) => {
            return Err(StoreError::Unavailable(
                "DATABASE_URL must be set when USE_PERSISTENT_STORES=true".to_string(),
            )
            .into());
        }
        (false, _) => {
            // In-memory wiring (dev/test): contents are lost on restart.
            tracing::info!("using in-memory local store");
            Arc::new(InMemoryLocalStore::new())
        }
    };

    Ok(AppServices::from_parts(store, remote, config))
}

async fn build_persistent_store(database_url: &str) -> Result<Arc<dyn LocalStore>, StoreError> {
    let store = PostgresLocalStore::connect(database_url).await?;
    tracing::info!("using postgres local store");
    Ok(Arc::new(store))
}
