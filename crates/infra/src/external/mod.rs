//! Remote product lookup.
//!
//! One `fetch` is one network call; retries are the caller's concern
//! (see [`crate::retry::RetryPolicy`]).

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use foodscan_core::BarcodeValue;
use foodscan_products::ExternalPayload;

use crate::retry::RetryClass;

pub use http::{HttpClientError, HttpLookupClient};

/// Classified failure of a single remote fetch attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteLookupError {
    /// Remote rejected the request (4xx).
    #[error("remote client error: HTTP {status}")]
    Client { status: u16 },

    /// Remote failed to serve the request (5xx).
    #[error("remote server error: HTTP {status}")]
    Server { status: u16 },

    /// Connection failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response arrived but violates the payload contract. Raised locally.
    #[error("invalid remote response: {0}")]
    Format(String),
}

impl RemoteLookupError {
    /// Only server and transport failures are worth another attempt.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            RemoteLookupError::Server { .. } | RemoteLookupError::Transport(_) => RetryClass::Retry,
            RemoteLookupError::Client { .. } | RemoteLookupError::Format(_) => RetryClass::Abort,
        }
    }
}

/// Single-attempt remote lookup.
///
/// `Ok(None)` means the remote answered but has no product for the barcode.
#[async_trait]
pub trait RemoteLookupClient: Send + Sync {
    async fn fetch(
        &self,
        barcode: &BarcodeValue,
    ) -> Result<Option<ExternalPayload>, RemoteLookupError>;
}

#[async_trait]
impl<C> RemoteLookupClient for std::sync::Arc<C>
where
    C: RemoteLookupClient + ?Sized,
{
    async fn fetch(
        &self,
        barcode: &BarcodeValue,
    ) -> Result<Option<ExternalPayload>, RemoteLookupError> {
        (**self).fetch(barcode).await
    }
}
