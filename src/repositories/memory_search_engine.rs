//! In-memory search engine with sequence-number concurrency control.
//!
//! Mirrors the subset of Elasticsearch semantics the indexer relies on: every
//! successful write gets a fresh sequence number, and conditional writes fail
//! with a version conflict when the caller's token is stale.

use crate::error::{EngineResult, SearchEngineError};
use crate::models::{IndexedDocument, SeqToken, StoredHit};
use crate::repositories::traits::SearchEngine;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

const PRIMARY_TERM: u64 = 1;

#[derive(Debug, Default)]
struct MemoryIndex {
    /// Ordered by id so candidate scans are deterministic
    docs: BTreeMap<String, (IndexedDocument, SeqToken)>,
    next_seq_no: u64,
}

impl MemoryIndex {
    fn issue_token(&mut self) -> SeqToken {
        let token = SeqToken {
            seq_no: self.next_seq_no,
            primary_term: PRIMARY_TERM,
        };
        self.next_seq_no += 1;
        token
    }
}

/// Search engine kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemorySearchEngine {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl MemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, index: &str, f: impl FnOnce(&MemoryIndex) -> T) -> EngineResult<T> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        indexes
            .get(index)
            .map(f)
            .ok_or_else(|| SearchEngineError::NotFound(format!("index {}", index)))
    }

    fn write<T>(
        &self,
        index: &str,
        f: impl FnOnce(&mut MemoryIndex) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| SearchEngineError::NotFound(format!("index {}", index)))?;
        f(target)
    }
}

fn poisoned() -> SearchEngineError {
    SearchEngineError::HttpError("memory search engine lock poisoned".to_string())
}

fn conflict(id: &str) -> SearchEngineError {
    SearchEngineError::VersionConflict { id: id.to_string() }
}

#[async_trait]
impl SearchEngine for MemorySearchEngine {
    async fn ensure_index(&self, index: &str) -> EngineResult<()> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        indexes.entry(index.to_string()).or_default();
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| SearchEngineError::NotFound(format!("index {}", index)))
    }

    async fn get(&self, index: &str, id: &str) -> EngineResult<Option<StoredHit>> {
        self.read(index, |idx| {
            idx.docs.get(id).map(|(doc, token)| StoredHit {
                id: id.to_string(),
                document: doc.clone(),
                token: *token,
            })
        })
    }

    async fn put_conditional(
        &self,
        index: &str,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> EngineResult<SeqToken> {
        self.write(index, |idx| {
            let current = idx.docs.get(id).map(|(_, token)| *token);
            if current != expected {
                return Err(conflict(id));
            }
            let token = idx.issue_token();
            idx.docs.insert(id.to_string(), (doc.clone(), token));
            Ok(token)
        })
    }

    async fn clear_index(&self, index: &str) -> EngineResult<u64> {
        self.write(index, |idx| {
            let removed = idx.docs.len() as u64;
            idx.docs.clear();
            Ok(removed)
        })
    }

    async fn candidates(
        &self,
        index: &str,
        query: &str,
        in_paths: bool,
        in_values: bool,
        limit: usize,
    ) -> EngineResult<Vec<StoredHit>> {
        self.read(index, |idx| {
            idx.docs
                .iter()
                .filter(|(_, (doc, _))| {
                    !doc.deleted
                        && doc.flat.iter().any(|pair| {
                            (in_paths && pair.path.contains(query))
                                || (in_values && pair.value.contains(query))
                        })
                })
                .take(limit)
                .map(|(id, (doc, token))| StoredHit {
                    id: id.clone(),
                    document: doc.clone(),
                    token: *token,
                })
                .collect()
        })
    }

    async fn count(&self, index: &str) -> EngineResult<u64> {
        self.read(index, |idx| {
            idx.docs.values().filter(|(doc, _)| !doc.deleted).count() as u64
        })
    }
}
