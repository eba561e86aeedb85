//! Products domain module.
//!
//! This crate contains the catalog records and the rules that turn a remote
//! payload into a local product, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod derive;
pub mod product;
pub mod resolution;

pub use derive::{derive_name, derive_product, derive_sku, validate_payload, UNKNOWN_PRODUCT_NAME};
pub use product::{ExternalPayload, Product};
pub use resolution::{ResolutionResult, Statistics};
