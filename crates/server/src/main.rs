//! medref-worker entry point.
//!
//! Boots the offline cache worker, runs its install and activate phases, and
//! serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use medref_client::{Event, FetchConfig, HttpFetcher, MedicationsApi, Worker, WorkerConfig};
use medref_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

/// Deliver the configured sync tag on a fixed interval.
fn spawn_sync_ticker(worker: Arc<Worker>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let tag = worker.config().sync_tag.clone();
            if let Err(e) = worker.handle(Event::Sync { tag }).await {
                tracing::warn!(error = %e, "sync tick failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db = %config.db_path.display(), version = %config.cache_version, "starting medref-worker on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let worker = Arc::new(Worker::new(db, fetcher, WorkerConfig::from_app(&config)?));

    for event in [Event::Install, Event::Activate] {
        if let Err(e) = worker.handle(event).await {
            tracing::error!(error = %e, "worker lifecycle event failed");
        }
    }

    if let Some(interval) = config.sync_interval() {
        spawn_sync_ticker(worker.clone(), interval);
    }

    let api = MedicationsApi::new(
        worker.clone(),
        &config.data_store_url,
        config.sync_api_key.as_deref(),
        config.app_cache_ttl(),
    )?;

    let handler = handler::MedrefServer::new(worker, Arc::new(api));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
