//! Asynchronous indexing of queued document writes.
//!
//! A pass reads the *current* document and queue entry, flattens the content,
//! and writes it to the search engine under the engine's sequence-number guard.
//! The entry is only marked indexed through a compare-and-set on its
//! `updateVersion`, so a write that races in during the pass leaves the entry
//! pending for the next one. No lock is held across search-engine I/O.

mod worker;

pub use worker::{ReconcileNotifier, ReconcilerHandle};

use crate::error::{IndexingError, IndexingResult, SearchEngineError};
use crate::flatten::flatten;
use crate::metrics::{Metrics, Timer};
use crate::models::{
    IndexDefinition, IndexedDocument, QueueEntry, QueueKey, SeqToken, SourceRef,
};
use crate::repositories::{DocumentStore, IndexRegistry, QueueStore, SearchEngine};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// How a rebuild selects its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// Clear the target index, reset every monitored entry, then drain
    Full,
    /// Only entries that are already pending
    Incremental,
}

/// Result of reconciling one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Written to the engine and marked indexed
    Indexed,
    /// Engine already held this version with identical content; marked indexed
    Unchanged,
    /// Tombstone written to the engine and marked indexed
    Deleted,
    /// Engine holds a newer version, or its token moved under us
    Conflict,
    /// Engine write succeeded but a newer source write landed before marking
    Superseded,
    /// Document could not be flattened; left pending
    Malformed,
    /// No queue entry exists for the key
    Missing,
    /// Store or engine failure; left pending
    Failed { transient: bool, reason: String },
}

/// What a rebuild or pass did, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    pub index: String,
    /// Documents removed by a full rebuild's clear
    pub cleared: u64,
    pub processed: Vec<QueueKey>,
    pub indexed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub conflicts: usize,
    pub superseded: usize,
    pub malformed: usize,
    pub failed: usize,
}

impl RebuildReport {
    fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, key: QueueKey, outcome: &EntryOutcome) {
        self.processed.push(key);
        match outcome {
            EntryOutcome::Indexed => self.indexed += 1,
            EntryOutcome::Unchanged => self.unchanged += 1,
            EntryOutcome::Deleted => self.deleted += 1,
            EntryOutcome::Conflict => self.conflicts += 1,
            EntryOutcome::Superseded => self.superseded += 1,
            EntryOutcome::Malformed => self.malformed += 1,
            EntryOutcome::Missing | EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Entries that converged during this run.
    pub fn converged(&self) -> usize {
        self.indexed + self.unchanged + self.deleted
    }
}

/// Drains queue ledgers into the search engine.
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn QueueStore>,
    engine: Arc<dyn SearchEngine>,
    registry: Arc<dyn IndexRegistry>,
    metrics: Metrics,
    workers: usize,
    batch_size: usize,
    /// Attempts hold it shared; a full rebuild's clear and reset hold it
    /// exclusively so no attempt can mark an entry whose engine document
    /// was just cleared.
    rebuild_gate: RwLock<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn QueueStore>,
        engine: Arc<dyn SearchEngine>,
        registry: Arc<dyn IndexRegistry>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            queue,
            engine,
            registry,
            metrics,
            workers: 4,
            batch_size: 500,
            rebuild_gate: RwLock::new(()),
        }
    }

    /// Bound the number of entries processed concurrently within one pass.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Bound the number of entries a periodic pass takes per index.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Reconcile one entry against `definition`'s target index.
    ///
    /// Version conflicts, superseded marks and malformed documents are
    /// outcomes, not errors. Errors are store or engine failures; the entry
    /// stays pending either way.
    pub async fn reconcile_entry(
        &self,
        definition: &IndexDefinition,
        key: &QueueKey,
    ) -> IndexingResult<EntryOutcome> {
        if !definition.monitors(&key.db, &key.collection) {
            return Err(IndexingError::UnmonitoredSource {
                index: definition.name.clone(),
                db: key.db.clone(),
                coll: key.collection.clone(),
            });
        }

        let _attempt = self.rebuild_gate.read().await;
        let Some(snapshot) = self.store.snapshot(key).await? else {
            return Ok(EntryOutcome::Missing);
        };
        let entry = snapshot.entry;
        let target = definition.target_index.as_str();

        let content = match snapshot.content {
            Some(content) if !entry.is_deleted => content,
            _ => return self.propagate_tombstone(target, key, &entry).await,
        };

        let flat = match flatten(&content.body) {
            Ok(flat) => flat,
            Err(e) => {
                tracing::warn!(doc_id = %key, error = %e, "Skipping malformed document");
                self.metrics.record_malformed();
                return Ok(EntryOutcome::Malformed);
            }
        };

        let version = entry.update_version;
        let doc = IndexedDocument {
            flat,
            update_version: version,
            update_at: entry.update_at,
            update_at_time_zone: entry.update_at_time_zone.unwrap_or(0),
            source: SourceRef::new(key.db.as_str(), key.collection.as_str()),
            deleted: false,
        };

        let current = self.engine.get(target, &entry.mongo_id).await?;
        if let Some(hit) = &current {
            if hit.document.update_version > version {
                tracing::debug!(
                    doc_id = %key,
                    update_version = version,
                    engine_version = hit.document.update_version,
                    "Engine already holds a newer version"
                );
                self.metrics.record_version_conflict();
                return Ok(EntryOutcome::Conflict);
            }
            if hit.document.update_version == version
                && !hit.document.deleted
                && hit.document.flat == doc.flat
            {
                return self.mark(key, version, EntryOutcome::Unchanged).await;
            }
        }

        let expected = current.map(|hit| hit.token);
        if !self.write_conditional(target, key, &entry.mongo_id, &doc, expected).await? {
            return Ok(EntryOutcome::Conflict);
        }

        tracing::debug!(index = %target, doc_id = %key, update_version = version, "Indexed document");
        self.mark(key, version, EntryOutcome::Indexed).await
    }

    /// Replace the engine document with a tombstone at the entry's version.
    ///
    /// The tombstone keeps `updateVersion` in the engine, so an attempt still
    /// holding older content fails its version check instead of recreating
    /// the document.
    async fn propagate_tombstone(
        &self,
        target: &str,
        key: &QueueKey,
        entry: &QueueEntry,
    ) -> IndexingResult<EntryOutcome> {
        let version = entry.update_version;
        let current = self.engine.get(target, &entry.mongo_id).await?;
        if let Some(hit) = &current {
            if hit.document.update_version > version {
                self.metrics.record_version_conflict();
                return Ok(EntryOutcome::Conflict);
            }
            if hit.document.update_version == version && hit.document.deleted {
                return self.mark(key, version, EntryOutcome::Deleted).await;
            }
        }

        let tombstone = IndexedDocument::tombstone(
            version,
            entry.update_at,
            entry.update_at_time_zone.unwrap_or(0),
            SourceRef::new(key.db.as_str(), key.collection.as_str()),
        );
        let expected = current.map(|hit| hit.token);
        if !self
            .write_conditional(target, key, &entry.mongo_id, &tombstone, expected)
            .await?
        {
            return Ok(EntryOutcome::Conflict);
        }
        self.metrics.record_tombstone();

        tracing::debug!(index = %target, doc_id = %key, update_version = version, "Propagated tombstone");
        self.mark(key, version, EntryOutcome::Deleted).await
    }

    /// Conditional write; `false` when another writer got there first.
    async fn write_conditional(
        &self,
        target: &str,
        key: &QueueKey,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> IndexingResult<bool> {
        match self.engine.put_conditional(target, id, doc, expected).await {
            Ok(_) => Ok(true),
            Err(SearchEngineError::VersionConflict { .. }) => {
                tracing::debug!(
                    doc_id = %key,
                    update_version = doc.update_version,
                    "Lost conditional write"
                );
                self.metrics.record_version_conflict();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn mark(
        &self,
        key: &QueueKey,
        version: i64,
        on_success: EntryOutcome,
    ) -> IndexingResult<EntryOutcome> {
        if self.queue.try_mark_indexed(key, version).await? {
            if on_success == EntryOutcome::Indexed {
                self.metrics.record_indexed();
            }
            Ok(on_success)
        } else {
            tracing::debug!(doc_id = %key, update_version = version, "Newer write landed; entry stays pending");
            self.metrics.record_version_conflict();
            Ok(EntryOutcome::Superseded)
        }
    }

    /// [`Self::reconcile_entry`] with failures folded into the outcome.
    async fn process(&self, definition: &IndexDefinition, key: &QueueKey) -> EntryOutcome {
        match self.reconcile_entry(definition, key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let transient = match &e {
                    IndexingError::SearchEngine(err) => err.is_transient(),
                    _ => false,
                };
                if transient {
                    self.metrics.record_transient_failure();
                }
                tracing::warn!(doc_id = %key, error = %e, transient, "Indexing attempt failed");
                EntryOutcome::Failed {
                    transient,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Reconcile the entry behind `key` against whichever index monitors it.
    ///
    /// Returns `None` when no index monitors the source.
    pub async fn reconcile_key(&self, key: &QueueKey) -> IndexingResult<Option<EntryOutcome>> {
        let definition = self
            .registry
            .find_by_source(&key.db, &key.collection)
            .await?;
        match definition {
            Some(definition) => Ok(Some(self.process(&definition, key).await)),
            None => Ok(None),
        }
    }

    /// Rebuild `definition`'s target index, processing at most `max_docs`
    /// entries in ascending `updateVersion` order.
    pub async fn rebuild(
        &self,
        definition: &IndexDefinition,
        mode: RebuildMode,
        max_docs: usize,
    ) -> IndexingResult<RebuildReport> {
        let timer = Timer::new(format!("rebuild:{}", definition.name));
        let mut report = RebuildReport::new(&definition.name);

        if mode == RebuildMode::Full {
            let _exclusive = self.rebuild_gate.write().await;
            report.cleared = self.engine.clear_index(&definition.target_index).await?;
            for source in &definition.sources {
                let reset = self
                    .queue
                    .reset_for_rebuild(&source.db_name, &source.coll_name)
                    .await?;
                tracing::debug!(
                    index = %definition.name,
                    db = %source.db_name,
                    coll = %source.coll_name,
                    reset,
                    "Reset queue entries for full rebuild"
                );
            }
        }

        let keys = self.pending_keys(definition, max_docs).await?;
        let outcomes: Vec<(QueueKey, EntryOutcome)> = stream::iter(keys)
            .map(|key| async move {
                let outcome = self.process(definition, &key).await;
                (key, outcome)
            })
            .buffered(self.workers)
            .collect()
            .await;

        for (key, outcome) in outcomes {
            report.record(key, &outcome);
        }
        self.metrics.record_pass();
        timer.finish();

        if !report.processed.is_empty() {
            tracing::info!(
                index = %definition.name,
                mode = ?mode,
                processed = report.processed.len(),
                converged = report.converged(),
                conflicts = report.conflicts,
                malformed = report.malformed,
                failed = report.failed,
                "Reconciler pass finished"
            );
        }
        Ok(report)
    }

    /// Pending entries across all of `definition`'s sources, globally ordered
    /// by `(updateVersion, key)` and truncated to `max_docs`.
    async fn pending_keys(
        &self,
        definition: &IndexDefinition,
        max_docs: usize,
    ) -> IndexingResult<Vec<QueueKey>> {
        let mut pending: Vec<(i64, QueueKey)> = Vec::new();
        for source in &definition.sources {
            let entries = self
                .queue
                .list_pending(&source.db_name, Some(&source.coll_name), max_docs)
                .await?;
            pending.extend(
                entries
                    .into_iter()
                    .map(|e| (e.update_version, e.key(&source.db_name))),
            );
        }
        pending.sort();
        pending.truncate(max_docs);
        Ok(pending.into_iter().map(|(_, key)| key).collect())
    }

    /// One incremental pass over every registered index.
    pub async fn pass(&self) -> IndexingResult<Vec<RebuildReport>> {
        let definitions = self.registry.list().await?;
        let mut reports = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            match self
                .rebuild(definition, RebuildMode::Incremental, self.batch_size)
                .await
            {
                Ok(report) => reports.push(report),
                // One unreachable index must not starve the others
                Err(e) => tracing::warn!(index = %definition.name, error = %e, "Pass failed"),
            }
        }
        Ok(reports)
    }
}
