//! Infrastructure layer: local store adapters, remote lookup, retry, config,
//! and the resolution engine that composes them.

pub mod config;
pub mod external;
pub mod resolver;
pub mod retry;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use external::{HttpClientError, HttpLookupClient, RemoteLookupClient, RemoteLookupError};
pub use resolver::{CallerOrigin, ResolutionEngine, ResolveError};
pub use retry::{BackoffStrategy, RetryClass, RetryPolicy};
pub use store::{InMemoryLocalStore, LocalStore, PostgresLocalStore, StoreError};
