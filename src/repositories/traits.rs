use crate::error::{EngineResult, RegistryResult, StoreResult};
use crate::models::*;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A document as held by the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Store-internal id, also used as the search engine document id
    pub mongo_id: String,
    pub body: DocValue,
}

/// Consistent read of a document and its queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub entry: QueueEntry,
    /// `None` when the document has been deleted
    pub content: Option<StoredDocument>,
}

/// Per-source queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub indexed: usize,
    pub tombstoned: usize,
}

/// Primary-of-record document storage.
///
/// Every write commits together with the matching queue bump; callers never
/// observe one without the other.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current content of a document.
    async fn get_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
    ) -> StoreResult<Option<StoredDocument>>;

    /// Set-field upsert of dotted paths, atomically with `recordUpdate`.
    async fn update_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        updates: &BTreeMap<String, DocValue>,
    ) -> StoreResult<QueueEntry>;

    /// Remove a document, atomically with `recordDelete`.
    async fn delete_document(&self, db: &str, coll: &str, doc_id: &str)
        -> StoreResult<QueueEntry>;

    /// Read content and queue entry from the same committed state.
    async fn snapshot(&self, key: &QueueKey) -> StoreResult<Option<DocumentSnapshot>>;
}

/// The per-database ledger of pending and completed indexing work.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn get_entry(&self, key: &QueueKey) -> StoreResult<Option<QueueEntry>>;

    /// Pending entries ordered by ascending `updateVersion`, at most `limit`.
    async fn list_pending(
        &self,
        db: &str,
        coll: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<QueueEntry>>;

    /// Mark indexed only if `updateVersion` still equals `committed_version`.
    ///
    /// Returns `false` when a newer write raced in; the entry stays pending.
    async fn try_mark_indexed(&self, key: &QueueKey, committed_version: i64)
        -> StoreResult<bool>;

    /// Reset `indexVersion` to 0 and status to pending for a whole source.
    async fn reset_for_rebuild(&self, db: &str, coll: &str) -> StoreResult<usize>;

    async fn list_entries(&self, db: &str, coll: &str) -> StoreResult<Vec<QueueEntry>>;

    async fn stats(&self, db: &str, coll: &str) -> StoreResult<QueueStats>;
}

/// Search engine with optimistic-concurrency writes.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create the index, or verify an existing one has a compatible mapping.
    async fn ensure_index(&self, index: &str) -> EngineResult<()>;

    async fn delete_index(&self, index: &str) -> EngineResult<()>;

    async fn get(&self, index: &str, id: &str) -> EngineResult<Option<StoredHit>>;

    /// Write `doc` under `id`.
    ///
    /// With `expected = None` the write only succeeds if the id is absent; with
    /// a token it only succeeds if the stored document still carries that token.
    /// Otherwise fails with `SearchEngineError::VersionConflict`.
    async fn put_conditional(
        &self,
        index: &str,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> EngineResult<SeqToken>;

    /// Remove every document, returning how many were removed.
    async fn clear_index(&self, index: &str) -> EngineResult<u64>;

    /// Live documents whose paths and/or values contain `query`, ordered by
    /// id. Tombstones never match.
    async fn candidates(
        &self,
        index: &str,
        query: &str,
        in_paths: bool,
        in_values: bool,
        limit: usize,
    ) -> EngineResult<Vec<StoredHit>>;

    /// Number of live (non-tombstone) documents.
    async fn count(&self, index: &str) -> EngineResult<u64>;
}

/// Administrative registry of index definitions.
#[async_trait]
pub trait IndexRegistry: Send + Sync {
    async fn create(&self, definition: IndexDefinition) -> RegistryResult<IndexDefinition>;

    async fn update(&self, definition: IndexDefinition) -> RegistryResult<IndexDefinition>;

    async fn delete(&self, name: &str) -> RegistryResult<IndexDefinition>;

    async fn get(&self, name: &str) -> RegistryResult<IndexDefinition>;

    async fn list(&self) -> RegistryResult<Vec<IndexDefinition>>;

    /// The index draining this source's queue, if any.
    async fn find_by_source(&self, db: &str, coll: &str)
        -> RegistryResult<Option<IndexDefinition>>;
}
