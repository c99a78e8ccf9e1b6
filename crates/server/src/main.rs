//! nimbus-sw entry point.
//!
//! Boots the offline worker and exposes it as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use nimbus_client::{FetchClient, FetchConfig};
use nimbus_core::{AppConfig, CacheDb};
use nimbus_worker::{Worker, WorkerSettings};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        scope = %config.scope,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "Starting nimbus-sw on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app(&config))?;
    let settings = WorkerSettings::from_config(&config)?;
    let worker = Arc::new(Worker::new(db, Arc::new(network), settings));

    match worker.start().await {
        Ok(Some(report)) => tracing::info!(evicted = ?report.evicted, "worker active"),
        Ok(None) => tracing::info!("worker installed, waiting"),
        Err(err) => match worker.serving_version().await {
            Some(version) => {
                tracing::warn!(error = %err, serving = %version, "install failed, serving previous install")
            }
            None => tracing::error!(error = %err, "worker failed to start, serving passthrough only"),
        },
    }

    let handler = handler::NimbusServer::new(worker.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    worker.background().drain().await;
    worker.db().close().await?;
    Ok(())
}
