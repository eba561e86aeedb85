use serde::Serialize;

use foodscan_products::{Product, Statistics};

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub sku: String,
    pub name: String,
    pub barcodes: Vec<String>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            sku: product.sku().to_string(),
            name: product.name().to_string(),
            barcodes: product.barcodes().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub barcodes_count: u64,
    pub sku_count: u64,
}

impl From<Statistics> for StatisticsResponse {
    fn from(stats: Statistics) -> Self {
        Self {
            barcodes_count: stats.barcodes_count,
            sku_count: stats.sku_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: AppInfo,
    pub database: DatabaseHealth,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
