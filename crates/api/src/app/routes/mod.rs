use axum::{Router, routing::get};

pub mod barcode;
pub mod system;

/// Router for all public endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/health/echo", get(system::echo))
        .merge(barcode::router())
}
