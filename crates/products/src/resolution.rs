//! Outcome types of a barcode resolution.

use serde::{Deserialize, Serialize};

use crate::product::Product;

/// Tagged outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// Served from the local store; no remote call was made.
    Found(Product),
    /// Resolved remotely and written back to the local store.
    Created(Product),
    /// Unknown locally and remotely (or the remote was unavailable).
    NotFound,
}

impl ResolutionResult {
    pub fn product(&self) -> Option<&Product> {
        match self {
            ResolutionResult::Found(p) | ResolutionResult::Created(p) => Some(p),
            ResolutionResult::NotFound => None,
        }
    }

}

/// Read-only aggregate over the barcode table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub barcodes_count: u64,
    pub sku_count: u64,
}
