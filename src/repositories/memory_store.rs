//! In-memory document store with a transactional queue ledger.
//!
//! Each database is guarded by its own mutex. A write runs inside a
//! [`StoreTransaction`] that stages document and queue changes; they are applied
//! together on success and discarded together on error.

use crate::error::{StoreError, StoreResult};
use crate::models::{DocValue, QueueEntry, QueueKey, QueueStatus};
use crate::repositories::traits::{
    DocumentSnapshot, DocumentStore, QueueStats, QueueStore, StoredDocument,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// (collection, doc id)
type RowKey = (String, String);

#[derive(Debug, Default)]
struct DatabaseState {
    documents: HashMap<RowKey, StoredDocument>,
    queue: HashMap<RowKey, QueueEntry>,
}

/// Staged writes against one database.
pub struct StoreTransaction<'a> {
    state: &'a DatabaseState,
    staged_docs: HashMap<RowKey, Option<StoredDocument>>,
    staged_queue: HashMap<RowKey, QueueEntry>,
    now_ms: i64,
    tz: Option<i32>,
}

impl<'a> StoreTransaction<'a> {
    fn row(coll: &str, doc_id: &str) -> RowKey {
        (coll.to_string(), doc_id.to_string())
    }

    pub fn get_document(&self, coll: &str, doc_id: &str) -> Option<&StoredDocument> {
        let row = Self::row(coll, doc_id);
        match self.staged_docs.get(&row) {
            Some(staged) => staged.as_ref(),
            None => self.state.documents.get(&row),
        }
    }

    pub fn put_document(&mut self, coll: &str, doc_id: &str, doc: StoredDocument) {
        self.staged_docs.insert(Self::row(coll, doc_id), Some(doc));
    }

    pub fn remove_document(&mut self, coll: &str, doc_id: &str) {
        self.staged_docs.insert(Self::row(coll, doc_id), None);
    }

    pub fn get_entry(&self, coll: &str, doc_id: &str) -> Option<&QueueEntry> {
        let row = Self::row(coll, doc_id);
        self.staged_queue
            .get(&row)
            .or_else(|| self.state.queue.get(&row))
    }

    /// Create the entry at version 1, or bump it by exactly one.
    pub fn record_update(&mut self, coll: &str, doc_id: &str, mongo_id: &str) -> QueueEntry {
        let entry = match self.get_entry(coll, doc_id).cloned() {
            Some(mut entry) => {
                entry.bump(self.now_ms, self.tz);
                entry
            }
            None => QueueEntry::first_write(coll, doc_id, mongo_id, self.now_ms, self.tz),
        };
        self.staged_queue
            .insert(Self::row(coll, doc_id), entry.clone());
        entry
    }

    /// Tombstone an existing entry.
    pub fn record_delete(&mut self, coll: &str, doc_id: &str) -> StoreResult<QueueEntry> {
        let mut entry = self
            .get_entry(coll, doc_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("queue entry {}/{}", coll, doc_id)))?;
        entry.tombstone(self.now_ms, self.tz);
        self.staged_queue
            .insert(Self::row(coll, doc_id), entry.clone());
        Ok(entry)
    }
}

/// Document store keeping every database in memory.
pub struct MemoryDocumentStore {
    databases: RwLock<HashMap<String, Arc<Mutex<DatabaseState>>>>,
    tz: Option<i32>,
    object_counter: AtomicU64,
}

impl MemoryDocumentStore {
    /// `tz` is the hour offset recorded in `*TimeZone` fields.
    pub fn new(tz: Option<i32>) -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            tz,
            object_counter: AtomicU64::new(1),
        }
    }

    fn database(&self, db: &str) -> StoreResult<Arc<Mutex<DatabaseState>>> {
        if let Some(existing) = self
            .databases
            .read()
            .map_err(|_| poisoned("database map"))?
            .get(db)
        {
            return Ok(existing.clone());
        }
        let mut databases = self.databases.write().map_err(|_| poisoned("database map"))?;
        Ok(databases.entry(db.to_string()).or_default().clone())
    }

    fn existing_database(&self, db: &str) -> StoreResult<Option<Arc<Mutex<DatabaseState>>>> {
        Ok(self
            .databases
            .read()
            .map_err(|_| poisoned("database map"))?
            .get(db)
            .cloned())
    }

    fn lock(state: &Mutex<DatabaseState>) -> StoreResult<MutexGuard<'_, DatabaseState>> {
        state.lock().map_err(|_| poisoned("database"))
    }

    /// 24 hex characters, ObjectId-shaped.
    fn next_object_id(&self) -> String {
        let secs = chrono::Utc::now().timestamp() as u32;
        let seq = self.object_counter.fetch_add(1, Ordering::Relaxed);
        format!("{:08x}{:016x}", secs, seq)
    }

    /// Run `f` atomically against one database.
    ///
    /// Staged changes are applied only when `f` returns `Ok`.
    pub fn transaction<T, F>(&self, db: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> StoreResult<T>,
    {
        let handle = self.database(db)?;
        let mut guard = Self::lock(&handle)?;

        let (result, staged_docs, staged_queue) = {
            let mut tx = StoreTransaction {
                state: &*guard,
                staged_docs: HashMap::new(),
                staged_queue: HashMap::new(),
                now_ms: chrono::Utc::now().timestamp_millis(),
                tz: self.tz,
            };
            let result = f(&mut tx);
            (result, tx.staged_docs, tx.staged_queue)
        };

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(db = %db, error = %e, "Transaction aborted");
                return Err(e);
            }
        };

        for (row, doc) in staged_docs {
            match doc {
                Some(doc) => {
                    guard.documents.insert(row, doc);
                }
                None => {
                    guard.documents.remove(&row);
                }
            }
        }
        for (row, entry) in staged_queue {
            guard.queue.insert(row, entry);
        }
        Ok(value)
    }

    fn with_database<T>(
        &self,
        db: &str,
        empty: T,
        f: impl FnOnce(&mut DatabaseState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        match self.existing_database(db)? {
            Some(handle) => {
                let mut guard = Self::lock(&handle)?;
                f(&mut guard)
            }
            None => Ok(empty),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(None)
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{} lock poisoned", what))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
    ) -> StoreResult<Option<StoredDocument>> {
        let row = (coll.to_string(), doc_id.to_string());
        self.with_database(db, None, |state| Ok(state.documents.get(&row).cloned()))
    }

    async fn update_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        updates: &BTreeMap<String, DocValue>,
    ) -> StoreResult<QueueEntry> {
        self.transaction(db, |tx| {
            let existing = tx.get_document(coll, doc_id).cloned();
            // A re-created document keeps its id so the tombstone is overwritten in place.
            let mongo_id = existing
                .as_ref()
                .map(|d| d.mongo_id.clone())
                .or_else(|| tx.get_entry(coll, doc_id).map(|e| e.mongo_id.clone()))
                .unwrap_or_else(|| self.next_object_id());

            let entry = tx.record_update(coll, doc_id, &mongo_id);

            let mut body = existing
                .map(|d| d.body)
                .unwrap_or_else(DocValue::empty_object);
            for (path, value) in updates {
                body.set_path(path, value.clone())
                    .map_err(StoreError::InvalidUpdate)?;
            }
            tx.put_document(coll, doc_id, StoredDocument { mongo_id, body });
            Ok(entry)
        })
    }

    async fn delete_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
    ) -> StoreResult<QueueEntry> {
        self.transaction(db, |tx| {
            if tx.get_document(coll, doc_id).is_none() {
                return Err(StoreError::NotFound(format!(
                    "document {}.{}/{}",
                    db, coll, doc_id
                )));
            }
            tx.remove_document(coll, doc_id);
            tx.record_delete(coll, doc_id)
        })
    }

    async fn snapshot(&self, key: &QueueKey) -> StoreResult<Option<DocumentSnapshot>> {
        let row = (key.collection.clone(), key.doc_id.clone());
        self.with_database(&key.db, None, |state| {
            Ok(state.queue.get(&row).map(|entry| DocumentSnapshot {
                entry: entry.clone(),
                content: state.documents.get(&row).cloned(),
            }))
        })
    }
}

#[async_trait]
impl QueueStore for MemoryDocumentStore {
    async fn get_entry(&self, key: &QueueKey) -> StoreResult<Option<QueueEntry>> {
        let row = (key.collection.clone(), key.doc_id.clone());
        self.with_database(&key.db, None, |state| Ok(state.queue.get(&row).cloned()))
    }

    async fn list_pending(
        &self,
        db: &str,
        coll: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<QueueEntry>> {
        self.with_database(db, Vec::new(), |state| {
            let mut pending: Vec<QueueEntry> = state
                .queue
                .values()
                .filter(|e| e.is_pending())
                .filter(|e| coll.map_or(true, |c| e.collection == c))
                .cloned()
                .collect();
            pending.sort_by(|a, b| {
                a.update_version
                    .cmp(&b.update_version)
                    .then_with(|| a.collection.cmp(&b.collection))
                    .then_with(|| a.doc_id.cmp(&b.doc_id))
            });
            pending.truncate(limit);
            Ok(pending)
        })
    }

    async fn try_mark_indexed(&self, key: &QueueKey, committed_version: i64) -> StoreResult<bool> {
        let row = (key.collection.clone(), key.doc_id.clone());
        let handle = self
            .existing_database(&key.db)?
            .ok_or_else(|| StoreError::NotFound(format!("queue entry {}", key)))?;
        let mut guard = Self::lock(&handle)?;
        let entry = guard
            .queue
            .get_mut(&row)
            .ok_or_else(|| StoreError::NotFound(format!("queue entry {}", key)))?;
        Ok(entry.try_mark_indexed(committed_version))
    }

    async fn reset_for_rebuild(&self, db: &str, coll: &str) -> StoreResult<usize> {
        self.with_database(db, 0, |state| {
            let mut reset = 0;
            for entry in state.queue.values_mut().filter(|e| e.collection == coll) {
                entry.reset_for_rebuild();
                reset += 1;
            }
            Ok(reset)
        })
    }

    async fn list_entries(&self, db: &str, coll: &str) -> StoreResult<Vec<QueueEntry>> {
        self.with_database(db, Vec::new(), |state| {
            let mut entries: Vec<QueueEntry> = state
                .queue
                .values()
                .filter(|e| e.collection == coll)
                .cloned()
                .collect();
            entries.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
            Ok(entries)
        })
    }

    async fn stats(&self, db: &str, coll: &str) -> StoreResult<QueueStats> {
        self.with_database(db, QueueStats::default(), |state| {
            let mut stats = QueueStats::default();
            for entry in state.queue.values().filter(|e| e.collection == coll) {
                stats.total += 1;
                match entry.status {
                    QueueStatus::PendingIndex => stats.pending += 1,
                    QueueStatus::Indexed => stats.indexed += 1,
                }
                if entry.is_deleted {
                    stats.tombstoned += 1;
                }
            }
            Ok(stats)
        })
    }
}
