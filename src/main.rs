//! Flat Index Sync - Main entry point
//!
//! Serves document writes, index administration and substring search over the
//! Model Context Protocol, with a background reconciler keeping the search
//! index converged.

use anyhow::Result;
use flat_index_sync::repositories::{
    DocumentStore, IndexRegistry, MemoryDocumentStore, MemoryIndexRegistry, MemorySearchEngine,
    QueueStore, SearchEngine,
};
use flat_index_sync::services::{
    DocumentService, DocumentServiceImpl, IndexService, IndexServiceImpl,
};
use flat_index_sync::{
    Config, ElasticClient, ElasticSearchEngine, IndexSyncMcpServer, Metrics, PageLimits,
    Reconciler, ReconcilerHandle, SearchMatcher,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Configuration first so LOG_LEVEL can seed the filter
    let config = Config::from_env();
    let default_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "error".to_string());

    // stderr only; stdout carries the MCP protocol
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match config {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let metrics = Metrics::new();

    let engine: Arc<dyn SearchEngine> = match ElasticClient::from_config(&config, metrics.clone())
    {
        Some(client) => {
            info!(
                "Using search engine at {}",
                config.search_engine_url.as_deref().unwrap_or_default()
            );
            Arc::new(ElasticSearchEngine::new(client))
        }
        None => {
            info!("SEARCH_ENGINE_URL not set; using in-memory search engine");
            Arc::new(MemorySearchEngine::new())
        }
    };

    let memory_store = Arc::new(MemoryDocumentStore::new(Some(config.timezone_offset_hours)));
    let store: Arc<dyn DocumentStore> = memory_store.clone();
    let queue: Arc<dyn QueueStore> = memory_store;
    let registry: Arc<dyn IndexRegistry> = Arc::new(MemoryIndexRegistry::new());

    let reconciler = Arc::new(
        Reconciler::new(
            store.clone(),
            queue.clone(),
            engine.clone(),
            registry.clone(),
            metrics.clone(),
        )
        .with_workers(config.reconciler_workers)
        .with_batch_size(config.reconciler_batch_size),
    );
    let handle = ReconcilerHandle::spawn(
        reconciler.clone(),
        Duration::from_millis(config.reconciler_interval_ms),
        config.reconciler_queue_capacity,
    );

    let document_service = Arc::new(DocumentServiceImpl::new(store, Some(handle.notifier())))
        as Arc<dyn DocumentService>;
    let index_service = Arc::new(IndexServiceImpl::new(
        registry.clone(),
        engine.clone(),
        queue,
        reconciler,
    )) as Arc<dyn IndexService>;
    let search = Arc::new(SearchMatcher::new(
        engine,
        registry,
        PageLimits::from(&config),
        metrics.clone(),
    ));

    let server = IndexSyncMcpServer::new(document_service, index_service, search);

    info!(
        workers = config.reconciler_workers,
        interval_ms = config.reconciler_interval_ms,
        "Starting MCP server with stdio transport"
    );
    let result = flat_index_sync::server::run_server(server).await;

    handle.shutdown().await;
    info!(summary = ?metrics.summary(), "Flat Index Sync shutdown complete");
    result
}
