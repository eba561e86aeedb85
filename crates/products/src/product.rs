use serde::{Deserialize, Serialize};

use foodscan_core::{BarcodeValue, Sku};

/// Catalog product, keyed by SKU and owning a set of barcodes.
///
/// The barcode set is a read view assembled by the store from the barcode
/// table, where each row carries a nullable reference to its owning SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,
    name: String,
    barcodes: Vec<BarcodeValue>,
}

impl Product {
    pub fn new(sku: Sku, name: impl Into<String>, barcodes: Vec<BarcodeValue>) -> Self {
        let mut barcodes = barcodes;
        barcodes.sort();
        barcodes.dedup();
        Self {
            sku,
            name: name.into(),
            barcodes,
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn barcodes(&self) -> &[BarcodeValue] {
        &self.barcodes
    }
}

/// Product data as reported by the remote lookup service.
///
/// Every field besides the barcode is optional; [`crate::validate_payload`]
/// decides whether the payload is usable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalPayload {
    pub barcode: String,
    pub product_name: Option<String>,
    pub quantity: Option<String>,
    pub brands: Option<String>,
    pub energy_kcal_100g: Option<f64>,
}
