use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
};

use foodscan_products::ResolutionResult;

use crate::app::dto::{ProductResponse, StatisticsResponse};
use crate::app::errors::{json_error, resolve_error_to_response};
use crate::app::services::AppServices;
use crate::context::caller_origin;

/// Routes are registered with full paths: `/api/barcode` and
/// `/api/barcode/` must stay distinct.
pub fn router() -> Router {
    Router::new()
        .route("/api/barcode", get(statistics))
        .route("/api/barcode/", any(empty_barcode))
        .route("/api/barcode/:barcode", get(resolve).delete(delete_barcode))
}

/// `GET /api/barcode/{barcode}`: 200 when known locally, 201 when resolved
/// remotely and persisted.
pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
) -> Response {
    match services.engine.resolve(&barcode).await {
        Ok(ResolutionResult::Found(product)) => {
            (StatusCode::OK, Json(ProductResponse::from(product))).into_response()
        }
        Ok(ResolutionResult::Created(product)) => {
            (StatusCode::CREATED, Json(ProductResponse::from(product))).into_response()
        }
        Ok(ResolutionResult::NotFound) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no product found for barcode '{barcode}'"),
        ),
        Err(e) => resolve_error_to_response(e, &barcode),
    }
}

/// `DELETE /api/barcode/{barcode}`: local callers only.
pub async fn delete_barcode(
    Extension(services): Extension<Arc<AppServices>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(barcode): Path<String>,
) -> Response {
    match services
        .engine
        .delete_barcode(&barcode, caller_origin(peer))
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => resolve_error_to_response(e, &barcode),
    }
}

/// `GET /api/barcode`
pub async fn statistics(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.engine.statistics().await {
        Some(stats) => Json(StatisticsResponse::from(stats)).into_response(),
        None => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "statistics unavailable",
        ),
    }
}

/// Any request to `/api/barcode/` with an empty barcode segment.
pub async fn empty_barcode() -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "bad_request",
        "barcode must not be empty",
    )
}
