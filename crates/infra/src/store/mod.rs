//! Local product store: durable mapping from barcode to owning product.
//!
//! Two tables are modeled: `product(sku, name)` and `barcode(barcode, sku)`,
//! with ownership expressed as an explicit foreign key on the barcode row.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use foodscan_core::{BarcodeValue, Sku};
use foodscan_products::{Product, Statistics};

pub use in_memory::InMemoryLocalStore;
pub use postgres::PostgresLocalStore;

/// Local store operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Repository over the product and barcode tables.
///
/// ## Write semantics
///
/// - `upsert_product` is create-or-update on the product row (last write wins
///   for `name`).
/// - `insert_barcode_if_absent` is insert-or-ignore: an existing barcode row is
///   never reassigned, whoever owns it.
///
/// Both must be atomic so two concurrent first resolutions of one barcode
/// persist exactly one product/barcode pair without external locking.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Product owning `barcode`, with its full barcode set.
    async fn get(&self, barcode: &BarcodeValue) -> Result<Option<Product>, StoreError>;

    /// Product by SKU, with its full barcode set.
    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError>;

    async fn upsert_product(&self, sku: &Sku, name: &str) -> Result<(), StoreError>;

    /// Returns `true` only when this call created the barcode row.
    async fn insert_barcode_if_absent(
        &self,
        barcode: &BarcodeValue,
        sku: &Sku,
    ) -> Result<bool, StoreError>;

    async fn exists_barcode(&self, barcode: &BarcodeValue) -> Result<bool, StoreError>;

    /// Remove a single barcode mapping (never the owning product).
    async fn delete_barcode(&self, barcode: &BarcodeValue) -> Result<(), StoreError>;

    /// Row and distinct-owner counts; `None` when the store is unreachable.
    async fn statistics(&self) -> Option<Statistics>;

    /// Cheap reachability probe.
    async fn ping(&self) -> bool;
}

#[async_trait]
impl<S> LocalStore for Arc<S>
where
    S: LocalStore + ?Sized,
{
    async fn get(&self, barcode: &BarcodeValue) -> Result<Option<Product>, StoreError> {
        (**self).get(barcode).await
    }

    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        (**self).find_by_sku(sku).await
    }

    async fn upsert_product(&self, sku: &Sku, name: &str) -> Result<(), StoreError> {
        (**self).upsert_product(sku, name).await
    }

    async fn insert_barcode_if_absent(
        &self,
        barcode: &BarcodeValue,
        sku: &Sku,
    ) -> Result<bool, StoreError> {
        (**self).insert_barcode_if_absent(barcode, sku).await
    }

    async fn exists_barcode(&self, barcode: &BarcodeValue) -> Result<bool, StoreError> {
        (**self).exists_barcode(barcode).await
    }

    async fn delete_barcode(&self, barcode: &BarcodeValue) -> Result<(), StoreError> {
        (**self).delete_barcode(barcode).await
    }

    async fn statistics(&self) -> Option<Statistics> {
        (**self).statistics().await
    }

    async fn ping(&self) -> bool {
        (**self).ping().await
    }
}
