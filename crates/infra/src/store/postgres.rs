//! Postgres-backed local store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io` | `Unavailable` |
//! | `Database` and everything else | `Storage` |
//!
//! ## Atomicity
//!
//! Create-or-update and insert-or-ignore are single statements
//! (`ON CONFLICT ... DO UPDATE` / `ON CONFLICT ... DO NOTHING`), so concurrent
//! writers need no extra locking.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use foodscan_core::{BarcodeValue, Sku};
use foodscan_products::{Product, Statistics};

use super::{LocalStore, StoreError};

/// Postgres-backed product/barcode store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to share.
#[derive(Debug, Clone)]
pub struct PostgresLocalStore {
    pool: Arc<PgPool>,
}

impl PostgresLocalStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure both tables exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `product` and `barcode` tables if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS product (
                sku  VARCHAR(255)  PRIMARY KEY,
                name VARCHAR(1024) NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS barcode (
                barcode VARCHAR(255) PRIMARY KEY,
                sku     VARCHAR(255) NULL REFERENCES product (sku)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

/// Fold `(sku, name, owned)` rows of one product into a `Product`.
fn rows_to_product(rows: Vec<PgRow>) -> Result<Option<Product>, StoreError> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };

    let sku: String = first
        .try_get("sku")
        .map_err(|e| map_sqlx_error("decode sku", e))?;
    let name: String = first
        .try_get("name")
        .map_err(|e| map_sqlx_error("decode name", e))?;
    let sku = Sku::parse(sku).map_err(|e| StoreError::Storage(e.to_string()))?;

    let owned = rows
        .iter()
        .map(|r| r.try_get::<Option<String>, _>("owned"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_sqlx_error("decode owned barcode", e))?;

    Ok(Some(Product::new(sku, name, owned_barcodes(owned)?)))
}

/// Barcodes from the `owned` column; `NULL` means the product owns none.
fn owned_barcodes(
    values: impl IntoIterator<Item = Option<String>>,
) -> Result<Vec<BarcodeValue>, StoreError> {
    values
        .into_iter()
        .flatten()
        .map(|raw| {
            BarcodeValue::parse(raw)
                .map_err(|e| StoreError::Storage(format!("corrupt barcode row: {e}")))
        })
        .collect()
}

fn statistics_from_counts(barcodes: i64, skus: i64) -> Statistics {
    Statistics {
        barcodes_count: barcodes.max(0) as u64,
        sku_count: skus.max(0) as u64,
    }
}

#[async_trait]
impl LocalStore for PostgresLocalStore {
    #[instrument(skip_all, fields(barcode = %barcode), err)]
    async fn get(&self, barcode: &BarcodeValue) -> Result<Option<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.sku, p.name, owned.barcode AS owned
            FROM barcode b
            JOIN product p ON p.sku = b.sku
            LEFT JOIN barcode owned ON owned.sku = p.sku
            WHERE b.barcode = $1
            "#,
        )
        .bind(barcode.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        rows_to_product(rows)
    }

    #[instrument(skip_all, fields(sku = %sku), err)]
    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.sku, p.name, b.barcode AS owned
            FROM product p
            LEFT JOIN barcode b ON b.sku = p.sku
            WHERE p.sku = $1
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_sku", e))?;

        rows_to_product(rows)
    }

    #[instrument(skip_all, fields(sku = %sku), err)]
    async fn upsert_product(&self, sku: &Sku, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO product (sku, name)
            VALUES ($1, $2)
            ON CONFLICT (sku)
            DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(sku.as_str())
        .bind(name)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(barcode = %barcode, sku = %sku), err)]
    async fn insert_barcode_if_absent(
        &self,
        barcode: &BarcodeValue,
        sku: &Sku,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO barcode (barcode, sku)
            VALUES ($1, $2)
            ON CONFLICT (barcode) DO NOTHING
            "#,
        )
        .bind(barcode.as_str())
        .bind(sku.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_barcode_if_absent", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn exists_barcode(&self, barcode: &BarcodeValue) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM barcode WHERE barcode = $1) AS present")
            .bind(barcode.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_barcode", e))?;

        row.try_get::<bool, _>("present")
            .map_err(|e| map_sqlx_error("decode present", e))
    }

    #[instrument(skip_all, fields(barcode = %barcode), err(level = "debug"))]
    async fn delete_barcode(&self, barcode: &BarcodeValue) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM barcode WHERE barcode = $1")
            .bind(barcode.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_barcode", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn statistics(&self) -> Option<Statistics> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS barcodes_count, COUNT(DISTINCT sku) AS sku_count
            FROM barcode
            "#,
        )
        .fetch_one(&*self.pool)
        .await;

        let row = match row {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "statistics unavailable");
                return None;
            }
        };

        let counts = row
            .try_get::<i64, _>("barcodes_count")
            .and_then(|barcodes| Ok((barcodes, row.try_get::<i64, _>("sku_count")?)));

        match counts {
            Ok((barcodes, skus)) => Some(statistics_from_counts(barcodes, skus)),
            Err(e) => {
                tracing::warn!(error = %e, "statistics row could not be decoded");
                None
            }
        }
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&*self.pool).await.is_ok()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
