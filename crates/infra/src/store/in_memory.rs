use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use foodscan_core::{BarcodeValue, Sku};
use foodscan_products::{Product, Statistics};

use super::{LocalStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<Sku, String>,
    barcodes: HashMap<BarcodeValue, Option<Sku>>,
}

impl Tables {
    fn assemble(&self, sku: &Sku) -> Option<Product> {
        let name = self.products.get(sku)?;
        let barcodes = self
            .barcodes
            .iter()
            .filter_map(|(b, owner)| (owner.as_ref() == Some(sku)).then(|| b.clone()))
            .collect();
        Some(Product::new(sku.clone(), name.clone(), barcodes))
    }
}

/// In-memory local store for tests/dev.
///
/// Every operation runs under one lock acquisition, which makes upsert and
/// insert-or-ignore atomic with respect to each other.
#[derive(Debug)]
pub struct InMemoryLocalStore {
    inner: RwLock<Tables>,
    reachable: AtomicBool,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables::default()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Store pre-populated with seed products and their barcodes.
    pub fn with_seed(products: impl IntoIterator<Item = Product>) -> Self {
        let mut tables = Tables::default();
        for p in products {
            tables.products.insert(p.sku().clone(), p.name().to_string());
            for b in p.barcodes() {
                tables.barcodes.entry(b.clone()).or_insert_with(|| Some(p.sku().clone()));
            }
        }
        Self {
            inner: RwLock::new(tables),
            reachable: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (dev/test degraded mode).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unreachable".to_string()))
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.check_reachable()?;
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.check_reachable()?;
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, barcode: &BarcodeValue) -> Result<Option<Product>, StoreError> {
        let tables = self.read()?;
        let Some(Some(sku)) = tables.barcodes.get(barcode) else {
            return Ok(None);
        };
        Ok(tables.assemble(sku))
    }

    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.assemble(sku))
    }

    async fn upsert_product(&self, sku: &Sku, name: &str) -> Result<(), StoreError> {
        self.write()?.products.insert(sku.clone(), name.to_string());
        Ok(())
    }

    async fn insert_barcode_if_absent(
        &self,
        barcode: &BarcodeValue,
        sku: &Sku,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.barcodes.contains_key(barcode) {
            return Ok(false);
        }
        if !tables.products.contains_key(sku) {
            return Err(StoreError::Storage(format!(
                "barcode {barcode} references missing product {sku}"
            )));
        }
        tables.barcodes.insert(barcode.clone(), Some(sku.clone()));
        Ok(true)
    }

    async fn exists_barcode(&self, barcode: &BarcodeValue) -> Result<bool, StoreError> {
        Ok(self.read()?.barcodes.contains_key(barcode))
    }

    async fn delete_barcode(&self, barcode: &BarcodeValue) -> Result<(), StoreError> {
        match self.write()?.barcodes.remove(barcode) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn statistics(&self) -> Option<Statistics> {
        let tables = match self.read() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "statistics unavailable");
                return None;
            }
        };

        let mut owners: Vec<&Sku> = tables.barcodes.values().flatten().collect();
        owners.sort();
        owners.dedup();

        Some(Statistics {
            barcodes_count: tables.barcodes.len() as u64,
            sku_count: owners.len() as u64,
        })
    }

    async fn ping(&self) -> bool {
        self.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bc(s: &str) -> BarcodeValue {
        BarcodeValue::parse(s).unwrap()
    }

    fn sku(s: &str) -> Sku {
        Sku::parse(s).unwrap()
    }

    #[tokio::test]
    async fn get_missing_barcode_returns_none() {
        let store = InMemoryLocalStore::new();
        assert_eq!(store.get(&bc("123")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_then_insert_makes_product_visible() {
        let store = InMemoryLocalStore::new();
        store.upsert_product(&sku("SKU_1"), "Milk").await.unwrap();
        assert!(store.insert_barcode_if_absent(&bc("111"), &sku("SKU_1")).await.unwrap());

        let p = store.get(&bc("111")).await.unwrap().unwrap();
        assert_eq!(p.sku(), &sku("SKU_1"));
        assert_eq!(p.name(), "Milk");
        assert_eq!(p.barcodes(), &[bc("111")]);
    }

    #[tokio::test]
    async fn upsert_overwrites_name_and_is_idempotent() {
        let store = InMemoryLocalStore::new();
        store.upsert_product(&sku("SKU_1"), "Milk").await.unwrap();
        store.upsert_product(&sku("SKU_1"), "Whole Milk").await.unwrap();
        store.upsert_product(&sku("SKU_1"), "Whole Milk").await.unwrap();

        let p = store.find_by_sku(&sku("SKU_1")).await.unwrap().unwrap();
        assert_eq!(p.name(), "Whole Milk");
    }

    #[tokio::test]
    async fn insert_barcode_never_reassigns_owner() {
        let store = InMemoryLocalStore::new();
        store.upsert_product(&sku("SKU_A"), "A").await.unwrap();
        store.upsert_product(&sku("SKU_B"), "B").await.unwrap();

        assert!(store.insert_barcode_if_absent(&bc("111"), &sku("SKU_A")).await.unwrap());
        assert!(!store.insert_barcode_if_absent(&bc("111"), &sku("SKU_B")).await.unwrap());

        let p = store.get(&bc("111")).await.unwrap().unwrap();
        assert_eq!(p.sku(), &sku("SKU_A"));
    }

    #[tokio::test]
    async fn insert_barcode_requires_existing_product() {
        let store = InMemoryLocalStore::new();
        let err = store
            .insert_barcode_if_absent(&bc("111"), &sku("SKU_X"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[tokio::test]
    async fn delete_removes_mapping_but_keeps_product() {
        let store = InMemoryLocalStore::with_seed([Product::new(
            sku("SKU_1"),
            "Milk",
            vec![bc("111"), bc("222")],
        )]);

        store.delete_barcode(&bc("111")).await.unwrap();
        assert!(!store.exists_barcode(&bc("111")).await.unwrap());

        let p = store.find_by_sku(&sku("SKU_1")).await.unwrap().unwrap();
        assert_eq!(p.barcodes(), &[bc("222")]);

        assert_eq!(store.delete_barcode(&bc("111")).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn statistics_count_rows_and_distinct_owners() {
        let store = InMemoryLocalStore::with_seed([
            Product::new(sku("SKU_1"), "Milk", vec![bc("111"), bc("222")]),
            Product::new(sku("SKU_2"), "Bread", vec![bc("333")]),
        ]);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.barcodes_count, 3);
        assert_eq!(stats.sku_count, 2);
    }

    #[tokio::test]
    async fn unreachable_store_degrades_statistics() {
        let store = InMemoryLocalStore::new();
        store.set_reachable(false);
        assert!(store.statistics().await.is_none());
        assert!(!store.ping().await);
        assert!(matches!(store.get(&bc("1")).await, Err(StoreError::Unavailable(_))));
    }
}
