use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use foodscan_infra::ResolveError;

const INTERNAL_MESSAGE: &str = "internal server error";

/// Map an engine failure to an HTTP response.
///
/// Internal failures are logged with the barcode and cause; the response body
/// carries a fixed message only.
pub fn resolve_error_to_response(err: ResolveError, barcode: &str) -> axum::response::Response {
    match err {
        ResolveError::BadInput(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        ResolveError::NotFound => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("barcode '{barcode}' not found"),
        ),
        ResolveError::Forbidden => json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "operation allowed from the local host only",
        ),
        other => {
            tracing::error!(barcode = %barcode, error = %other, "request failed with internal error");
            internal_error()
        }
    }
}

pub fn internal_error() -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_MESSAGE)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": status.as_u16(),
            "time": Utc::now().to_rfc3339(),
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use foodscan_infra::StoreError;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (ResolveError::BadInput("barcode must not be empty".into()), StatusCode::BAD_REQUEST),
            (ResolveError::NotFound, StatusCode::NOT_FOUND),
            (ResolveError::Forbidden, StatusCode::FORBIDDEN),
            (ResolveError::Format("empty product name".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ResolveError::Remote("HTTP 400".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ResolveError::Store(StoreError::Storage("disk full".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(resolve_error_to_response(err, "123").status(), status);
        }
    }
}
