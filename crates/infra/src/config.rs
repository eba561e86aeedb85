//! Runtime configuration loaded from the environment (and an optional `.env`).

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::external::http::DEFAULT_TIMEOUT;
use crate::retry::{BackoffStrategy, RetryPolicy};

pub const DEFAULT_EXTERNAL_API_URL: &str = "https://world.openfoodfacts.org/api/v2/product/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable '{0}'")]
    Missing(&'static str),

    #[error("invalid value for '{var}': {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server_addr: SocketAddr,
    /// Remote lookup base URL; the barcode is appended verbatim.
    pub external_api_url: String,
    pub external_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_delay: Duration,
    pub retry_backoff: BackoffStrategy,
    pub use_persistent_stores: bool,
    /// Required when `use_persistent_stores` is set.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            external_api_url: DEFAULT_EXTERNAL_API_URL.to_string(),
            external_timeout: DEFAULT_TIMEOUT,
            retry_max_attempts: retry.max_attempts,
            retry_delay: retry.base_delay,
            retry_backoff: retry.strategy,
            use_persistent_stores: false,
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|var| std::env::var(var).ok())?;
        tracing::info!(
            server_addr = %config.server_addr,
            external_api_url = %config.external_api_url,
            persistent = config.use_persistent_stores,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Build from an arbitrary variable source. Unset or blank variables take
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let server_addr = match get("SERVER_ADDR") {
            Some(v) => parse_var("SERVER_ADDR", &v)?,
            None => defaults.server_addr,
        };

        let external_api_url = get("EXTERNAL_API_URL").unwrap_or(defaults.external_api_url);

        let external_timeout = match get("EXTERNAL_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_var("EXTERNAL_TIMEOUT_SECS", &v)?),
            None => defaults.external_timeout,
        };

        let retry_max_attempts = match get("EXTERNAL_RETRY_MAX_ATTEMPTS") {
            Some(v) => parse_var::<u32>("EXTERNAL_RETRY_MAX_ATTEMPTS", &v)?,
            None => defaults.retry_max_attempts,
        };
        if retry_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "EXTERNAL_RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let retry_delay = match get("EXTERNAL_RETRY_DELAY_MS") {
            Some(v) => Duration::from_millis(parse_var("EXTERNAL_RETRY_DELAY_MS", &v)?),
            None => defaults.retry_delay,
        };

        let retry_backoff = match get("EXTERNAL_RETRY_BACKOFF") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                var: "EXTERNAL_RETRY_BACKOFF",
                reason,
            })?,
            None => defaults.retry_backoff,
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(v) => parse_var("USE_PERSISTENT_STORES", &v.to_lowercase())?,
            None => false,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            server_addr,
            external_api_url,
            external_timeout,
            retry_max_attempts,
            retry_delay,
            retry_backoff,
            use_persistent_stores,
            database_url,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_max_attempts, self.retry_delay).with_strategy(self.retry_backoff)
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
