use std::net::SocketAddr;

use anyhow::Context;

use foodscan_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    foodscan_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let app = foodscan_api::app::build_app(&config)
        .await
        .context("failed to wire services")?;

    let listener = tokio::net::TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
