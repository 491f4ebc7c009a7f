//! Async wrapper around the synchronous ElasticClient.
//!
//! Runs each HTTP call on tokio's blocking pool so the reconciler's workers
//! never stall the async runtime.

use crate::client::ElasticClient;
use crate::error::{EngineResult, SearchEngineError};
use crate::models::{IndexedDocument, SeqToken, StoredHit};
use crate::repositories::SearchEngine;
use async_trait::async_trait;
use std::sync::Arc;

/// [`SearchEngine`] backed by an Elasticsearch-compatible HTTP endpoint.
#[derive(Clone)]
pub struct ElasticSearchEngine {
    client: Arc<ElasticClient>,
}

impl ElasticSearchEngine {
    pub fn new(client: ElasticClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn run<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ElasticClient) -> EngineResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| SearchEngineError::HttpError(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl SearchEngine for ElasticSearchEngine {
    async fn ensure_index(&self, index: &str) -> EngineResult<()> {
        let index = index.to_string();
        self.run(move |c| c.ensure_index(&index)).await
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        let index = index.to_string();
        self.run(move |c| c.delete_index(&index)).await
    }

    async fn get(&self, index: &str, id: &str) -> EngineResult<Option<StoredHit>> {
        let (index, id) = (index.to_string(), id.to_string());
        self.run(move |c| c.get_document(&index, &id)).await
    }

    async fn put_conditional(
        &self,
        index: &str,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> EngineResult<SeqToken> {
        let (index, id, doc) = (index.to_string(), id.to_string(), doc.clone());
        self.run(move |c| c.put_document(&index, &id, &doc, expected))
            .await
    }

    async fn clear_index(&self, index: &str) -> EngineResult<u64> {
        let index = index.to_string();
        self.run(move |c| c.clear_index(&index)).await
    }

    async fn candidates(
        &self,
        index: &str,
        query: &str,
        in_paths: bool,
        in_values: bool,
        limit: usize,
    ) -> EngineResult<Vec<StoredHit>> {
        let (index, query) = (index.to_string(), query.to_string());
        self.run(move |c| c.search_candidates(&index, &query, in_paths, in_values, limit))
            .await
    }

    async fn count(&self, index: &str) -> EngineResult<u64> {
        let index = index.to_string();
        self.run(move |c| c.count(&index)).await
    }
}
