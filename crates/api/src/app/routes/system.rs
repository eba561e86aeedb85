use std::sync::Arc;

use axum::{Extension, Json, extract::Query};
use chrono::Utc;
use serde::Deserialize;

use crate::app::dto::{AppInfo, DatabaseHealth, HealthResponse};
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<HealthResponse> {
    let connected = services.engine.store_reachable().await;
    if !connected {
        tracing::warn!(persistent = services.persistent, "local store unreachable");
    }

    Json(HealthResponse {
        status: "OK",
        app: AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
        },
        database: DatabaseHealth { connected },
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EchoQuery {
    message: Option<String>,
}

/// Liveness handshake: echoes `message`, or a greeting when absent.
pub async fn echo(Query(query): Query<EchoQuery>) -> String {
    query.message.unwrap_or_else(|| "Hello!".to_string())
}
