//! Index administration service.
//!
//! Creating an index verifies the target with the search engine before the
//! definition is registered, so a mapping mismatch surfaces here and is never
//! retried by the reconciler.

use crate::domain::IndexName;
use crate::error::{RegistryError, SearchEngineError, ServiceResult};
use crate::models::{IndexDefinition, SourceRef};
use crate::reconciler::{RebuildMode, RebuildReport, Reconciler};
use crate::repositories::{IndexRegistry, QueueStats, QueueStore, SearchEngine};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Queue counters for one monitored source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(flatten)]
    pub source: SourceRef,
    #[serde(flatten)]
    pub stats: QueueStats,
}

/// Snapshot of an index's convergence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub definition: IndexDefinition,
    /// Documents currently in the target search index
    pub indexed_documents: u64,
    pub sources: Vec<SourceStatus>,
}

impl IndexStatus {
    pub fn pending(&self) -> usize {
        self.sources.iter().map(|s| s.stats.pending).sum()
    }
}

/// Index service trait for administrative operations.
#[async_trait]
pub trait IndexService: Send + Sync {
    async fn create_index(&self, definition: IndexDefinition) -> ServiceResult<IndexDefinition>;

    /// Replace an existing definition's target index and sources.
    ///
    /// A new target index is created or verified before the definition
    /// changes. Documents already in the old target are not moved; run a
    /// full rebuild to populate the new one.
    async fn update_index(&self, definition: IndexDefinition) -> ServiceResult<IndexDefinition>;

    /// Drop the target index, then remove the definition.
    async fn delete_index(&self, name: &str) -> ServiceResult<IndexDefinition>;

    async fn list_indexes(&self) -> ServiceResult<Vec<IndexDefinition>>;

    /// `max_docs = None` drains everything pending.
    async fn rebuild_index(
        &self,
        name: &str,
        mode: RebuildMode,
        max_docs: Option<usize>,
    ) -> ServiceResult<RebuildReport>;

    async fn index_status(&self, name: &str) -> ServiceResult<IndexStatus>;
}

/// Default implementation of IndexService.
pub struct IndexServiceImpl {
    registry: Arc<dyn IndexRegistry>,
    engine: Arc<dyn SearchEngine>,
    queue: Arc<dyn QueueStore>,
    reconciler: Arc<Reconciler>,
}

impl IndexServiceImpl {
    pub fn new(
        registry: Arc<dyn IndexRegistry>,
        engine: Arc<dyn SearchEngine>,
        queue: Arc<dyn QueueStore>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            registry,
            engine,
            queue,
            reconciler,
        }
    }

    /// Create or verify the target index; a rejection is fatal for the definition.
    async fn verify_target(&self, definition: &IndexDefinition) -> ServiceResult<()> {
        if let Err(e) = self.engine.ensure_index(&definition.target_index).await {
            tracing::error!(
                index = %definition.name,
                target = %definition.target_index,
                error = %e,
                "Search engine rejected index"
            );
            return Err(RegistryError::Configuration(e).into());
        }
        Ok(())
    }
}

#[async_trait]
impl IndexService for IndexServiceImpl {
    async fn create_index(&self, definition: IndexDefinition) -> ServiceResult<IndexDefinition> {
        IndexName::new(definition.name.as_str())?;
        IndexName::new(definition.target_index.as_str())?;
        match self.registry.get(&definition.name).await {
            Ok(_) => return Err(RegistryError::AlreadyExists(definition.name).into()),
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.verify_target(&definition).await?;

        let created = self.registry.create(definition).await?;
        tracing::info!(
            index = %created.name,
            target = %created.target_index,
            sources = created.sources.len(),
            "Index created"
        );
        Ok(created)
    }

    async fn update_index(&self, definition: IndexDefinition) -> ServiceResult<IndexDefinition> {
        IndexName::new(definition.name.as_str())?;
        IndexName::new(definition.target_index.as_str())?;
        let current = self.registry.get(&definition.name).await?;

        if current.target_index != definition.target_index {
            self.verify_target(&definition).await?;
        }

        let updated = self.registry.update(definition).await?;
        tracing::info!(
            index = %updated.name,
            target = %updated.target_index,
            sources = updated.sources.len(),
            "Index updated"
        );
        Ok(updated)
    }

    async fn delete_index(&self, name: &str) -> ServiceResult<IndexDefinition> {
        let definition = self.registry.get(name).await?;
        // Engine first: if the drop fails the definition stays and can be retried
        match self.engine.delete_index(&definition.target_index).await {
            Ok(()) | Err(SearchEngineError::NotFound(_)) => {}
            Err(e) => {
                tracing::error!(index = %name, error = %e, "Failed to drop search index");
                return Err(e.into());
            }
        }
        let definition = self.registry.delete(name).await?;
        tracing::info!(index = %name, "Index deleted");
        Ok(definition)
    }

    async fn list_indexes(&self) -> ServiceResult<Vec<IndexDefinition>> {
        Ok(self.registry.list().await?)
    }

    async fn rebuild_index(
        &self,
        name: &str,
        mode: RebuildMode,
        max_docs: Option<usize>,
    ) -> ServiceResult<RebuildReport> {
        let definition = self.registry.get(name).await?;
        let report = self
            .reconciler
            .rebuild(&definition, mode, max_docs.unwrap_or(usize::MAX))
            .await?;
        Ok(report)
    }

    async fn index_status(&self, name: &str) -> ServiceResult<IndexStatus> {
        let definition = self.registry.get(name).await?;
        let indexed_documents = self.engine.count(&definition.target_index).await?;

        let mut sources = Vec::with_capacity(definition.sources.len());
        for source in &definition.sources {
            let stats = self.queue.stats(&source.db_name, &source.coll_name).await?;
            sources.push(SourceStatus {
                source: source.clone(),
                stats,
            });
        }

        Ok(IndexStatus {
            definition,
            indexed_documents,
            sources,
        })
    }
}
