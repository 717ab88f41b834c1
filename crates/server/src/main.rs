use std::sync::Arc;

use anyhow::Context;
use longreader_core::{MemoryStore, ParserConfig, ParserService};
use tracing_subscriber::EnvFilter;

mod routes;

const ENV_ADDR: &str = "LONGREADER_ADDR";
const DEFAULT_ADDR: &str = "0.0.0.0:8000";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ParserConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        "Daily limit {}, fetch timeout {}s, dev mode {}",
        config.daily_limit,
        config.fetch.timeout,
        config.dev_mode
    );

    let service =
        ParserService::with_http(Arc::new(MemoryStore::new()), config).context("Failed to build HTTP client")?;

    let addr = std::env::var(ENV_ADDR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, routes::app(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
