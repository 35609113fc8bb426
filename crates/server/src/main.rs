//! waypost server entry point.
//!
//! Boots the edge worker (install, then activate) and serves it as an MCP
//! server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use waypost_client::{EdgeWorker, FetchClient, FetchConfig};
use waypost_core::{AppConfig, EdgeDb};

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
        origin = %config.origin,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "Starting waypost server on stdio transport"
    );

    let db = Arc::new(EdgeDb::open(&config.db_path).await?);
    let transport = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(EdgeWorker::new(&config, db.clone(), db, transport)?);

    match worker.install().await {
        Ok(installation) => {
            tracing::info!(
                version = %installation.version,
                precached = installation.precached.len(),
                "install complete"
            )
        }
        Err(e) => tracing::warn!(error = %e, "install failed; serving from existing containers"),
    }
    worker.activate().await?;

    let handler = handler::WaypostServer::new(Arc::clone(&worker));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    worker.shutdown().await;

    Ok(())
}
