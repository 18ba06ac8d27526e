use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use pdfchunk_api::{build_router, build_state, spawn_rate_limit_janitor};
use pdfchunk_core::ServiceConfig;
use pdfchunk_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("pdfchunk_api");

    let config = ServiceConfig::from_env().context("invalid pdfchunk configuration")?;
    let state = build_state(&config).await?;
    spawn_rate_limit_janitor(state.limiter.clone(), Duration::from_secs(300));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed binding {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        chunk_size = config.chunk_size,
        output_bucket = %config.output_bucket,
        "pdfchunk api started"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
