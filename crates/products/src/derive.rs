//! Derivation of a local product from remote data.
//!
//! These functions are pure and deterministic: the same barcode and payload
//! always produce the same SKU and name, so two concurrent first resolutions
//! of one barcode write identical rows.

use foodscan_core::{BarcodeValue, DomainError, DomainResult, Sku};

use crate::product::{ExternalPayload, Product};

/// Prefix of every SKU derived from a barcode.
pub const SKU_PREFIX: &str = "SKU_";

/// Number of trailing barcode characters kept in a derived SKU.
pub const SKU_TAIL_LEN: usize = 6;

/// Name used when neither product name nor brand is usable.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";

const EMPTY_BARCODE_TAIL: &str = "000000";

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// `SKU_` followed by the last six characters of the barcode, the whole
/// barcode when shorter, or `000000` for an empty barcode.
pub fn derive_sku(barcode: &str) -> Sku {
    if barcode.is_empty() {
        return Sku::prefixed(SKU_PREFIX, EMPTY_BARCODE_TAIL);
    }

    let len = barcode.chars().count();
    let tail: String = barcode.chars().skip(len.saturating_sub(SKU_TAIL_LEN)).collect();
    Sku::prefixed(SKU_PREFIX, &tail)
}

/// Display name: product name, else brand, else [`UNKNOWN_PRODUCT_NAME`],
/// followed by `" " + quantity` when a quantity is present.
pub fn derive_name(payload: &ExternalPayload) -> String {
    let mut name = non_blank(payload.product_name.as_deref())
        .or_else(|| non_blank(payload.brands.as_deref()))
        .unwrap_or(UNKNOWN_PRODUCT_NAME)
        .to_string();

    if let Some(quantity) = non_blank(payload.quantity.as_deref()) {
        name.push(' ');
        name.push_str(quantity);
    }

    name
}

/// Reject payloads that carry neither a product name nor a brand.
pub fn validate_payload(payload: &ExternalPayload) -> DomainResult<()> {
    if non_blank(payload.product_name.as_deref()).is_none()
        && non_blank(payload.brands.as_deref()).is_none()
    {
        return Err(DomainError::invalid_format("empty product name"));
    }
    Ok(())
}

/// Build the product record persisted after a successful remote resolution.
pub fn derive_product(barcode: &BarcodeValue, payload: &ExternalPayload) -> Product {
    Product::new(
        derive_sku(barcode.as_str()),
        derive_name(payload),
        vec![barcode.clone()],
    )
}
