//! Flat Index Sync - keeps a character-level substring search index converged
//! with documents held in a primary document store.
//!
//! Document writes commit together with a per-document queue bump and return
//! immediately. A background reconciler drains the queue, flattens each
//! document into `(path, value)` pairs and writes them to the search engine
//! under optimistic concurrency, so a stale write never replaces newer content.
//!
//! # Architecture
//!
//! - **models**: Document values, queue entries, indexed documents, search payloads
//! - **flatten**: Nested document to ordered leaf pairs
//! - **repositories**: Document/queue store, search engine and registry seams with in-memory implementations
//! - **client**: Elasticsearch-compatible HTTP search engine
//! - **reconciler**: Queue draining, rebuilds and the background worker
//! - **search**: Character-offset substring matcher with pagination
//! - **services**: Write path and index administration
//! - **server**: MCP protocol server

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod flatten;
pub mod metrics;
pub mod models;
pub mod reconciler;
pub mod repositories;
pub mod search;
pub mod server;
pub mod services;

pub use client::{ElasticClient, ElasticSearchEngine};
pub use config::Config;
pub use error::{
    ConfigError, FlattenError, IndexingError, RegistryError, SearchEngineError, SearchError,
    ServiceError, StoreError,
};
pub use flatten::flatten;
pub use metrics::{Metrics, MetricsSummary, Timer};
pub use models::{DocValue, FlatPair, IndexDefinition, IndexedDocument, QueueEntry, QueueKey};
pub use reconciler::{EntryOutcome, RebuildMode, RebuildReport, Reconciler, ReconcilerHandle};
pub use search::{PageLimits, SearchMatcher};
pub use server::IndexSyncMcpServer;
