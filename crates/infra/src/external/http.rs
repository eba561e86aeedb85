//! HTTP lookup client for an Open Food Facts compatible product API.
//!
//! `GET {base_url}{barcode}` is expected to return
//! `{"code": .., "product": {"product_name", "quantity", "brands", "nutriments": {"energy-kcal_100g"}}}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use foodscan_core::BarcodeValue;
use foodscan_products::{ExternalPayload, validate_payload};

use super::{RemoteLookupClient, RemoteLookupError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    code: Option<String>,
    product: Option<WireProduct>,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    product_name: Option<String>,
    quantity: Option<String>,
    brands: Option<String>,
    nutriments: Option<WireNutriments>,
}

#[derive(Debug, Deserialize)]
struct WireNutriments {
    #[serde(rename = "energy-kcal_100g")]
    energy_kcal_100g: Option<f64>,
}

/// Failure to set up the HTTP lookup client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid lookup base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub struct HttpLookupClient {
    client: Client,
    base_url: Url,
}

impl HttpLookupClient {
    /// `base_url` must be hierarchical (`http://host/path/`); the barcode is
    /// appended to it as one percent-encoded path segment.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpClientError> {
        let invalid = |reason: String| HttpClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry path segments".to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Barcodes may contain `?`, `#`, `/` or spaces; each is escaped so the
    /// remote is always asked about the literal barcode.
    fn lookup_url(&self, barcode: &BarcodeValue) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(barcode.as_str());
        }
        url
    }

    fn to_payload(barcode: &BarcodeValue, response: LookupResponse) -> Option<ExternalPayload> {
        let product = response.product?;
        Some(ExternalPayload {
            barcode: response
                .code
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| barcode.to_string()),
            product_name: product.product_name,
            quantity: product.quantity,
            brands: product.brands,
            energy_kcal_100g: product.nutriments.and_then(|n| n.energy_kcal_100g),
        })
    }
}

#[async_trait]
impl RemoteLookupClient for HttpLookupClient {
    async fn fetch(
        &self,
        barcode: &BarcodeValue,
    ) -> Result<Option<ExternalPayload>, RemoteLookupError> {
        let url = self.lookup_url(barcode);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteLookupError::Transport(format!("HTTP request failed: {e}")))?;

        let status = resp.status();
        if status.is_client_error() {
            tracing::warn!(barcode = %barcode, status = status.as_u16(), "remote rejected lookup");
            return Err(RemoteLookupError::Client {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            tracing::warn!(barcode = %barcode, status = status.as_u16(), "remote lookup failed");
            return Err(RemoteLookupError::Server {
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| RemoteLookupError::Transport(format!("failed to read body: {e}")))?;
        let response: LookupResponse = serde_json::from_slice(&body)
            .map_err(|e| RemoteLookupError::Format(format!("JSON parse error: {e}")))?;

        let Some(payload) = Self::to_payload(barcode, response) else {
            tracing::debug!(barcode = %barcode, "remote has no product");
            return Ok(None);
        };

        if let Err(e) = validate_payload(&payload) {
            tracing::error!(barcode = %barcode, error = %e, "invalid remote response");
            return Err(RemoteLookupError::Format("empty product name".to_string()));
        }

        Ok(Some(payload))
    }
}
