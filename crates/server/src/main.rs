//! stash server entry point.
//!
//! Boots the cache tools on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use stash_client::{FetchClient, FetchConfig, FetchPipeline};
use stash_core::{AppConfig, RequestInterceptor, ResourceStore};

mod controller;
mod error;
mod handler;
mod tools;

use controller::{CacheController, CacheEvent};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(cache_dir = %config.cache_dir.display(), "Starting stash server on stdio transport");

    let store = Arc::new(ResourceStore::open(&config.cache_dir).await?);
    let interceptor = Arc::new(RequestInterceptor::from_config(store.clone(), &config)?);
    let client = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let pipeline = FetchPipeline::from_config(store.clone(), client.clone(), client, &config);
    let controller = Arc::new(CacheController::new(store, pipeline, interceptor));

    tokio::spawn(log_events(controller.subscribe()));

    let handler = handler::StashServer::new(controller);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<CacheEvent>) {
    loop {
        match events.recv().await {
            Ok(CacheEvent::Updated { url }) => tracing::info!(url = %url, "cache updated"),
            Ok(CacheEvent::Removed { url }) => tracing::info!(url = %url, "cache entry removed"),
            Ok(CacheEvent::Cleared) => tracing::info!("cache cleared"),
            Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "cache event log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
