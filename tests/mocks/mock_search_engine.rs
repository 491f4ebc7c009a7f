use async_trait::async_trait;
use flat_index_sync::error::{EngineResult, SearchEngineError};
use flat_index_sync::models::{IndexedDocument, SeqToken, StoredHit};
use flat_index_sync::repositories::{MemorySearchEngine, SearchEngine};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock search engine for testing.
///
/// Delegates to [`MemorySearchEngine`] and adds call tracking, injected
/// transient failures, and hooks that run right before or right after the
/// next conditional write so tests can land concurrent work mid-pass.
#[allow(dead_code)]
#[derive(Clone)]
pub struct MockSearchEngine {
    inner: Arc<MemorySearchEngine>,
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
    failures: Arc<Mutex<HashMap<String, usize>>>,
    before_put: Arc<Mutex<Option<BoxFuture<'static, ()>>>>,
    after_put: Arc<Mutex<Option<BoxFuture<'static, ()>>>>,
}

#[allow(dead_code)]
impl MockSearchEngine {
    /// Create a new empty MockSearchEngine.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemorySearchEngine::new()),
            call_counts: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            before_put: Arc::new(Mutex::new(None)),
            after_put: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the next `count` calls of `method` fail with a timeout.
    pub fn fail_next(&self, method: &str, count: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), count);
    }

    /// Make the next `count` conditional writes fail with a timeout.
    pub fn fail_next_puts(&self, count: usize) {
        self.fail_next("put_conditional", count);
    }

    /// Run `hook` once, just before the next conditional write reaches the engine.
    pub fn before_next_put(&self, hook: BoxFuture<'static, ()>) {
        *self.before_put.lock().unwrap() = Some(hook);
    }

    /// Run `hook` once, right after the next successful conditional write.
    pub fn after_next_put(&self, hook: BoxFuture<'static, ()>) {
        *self.after_put.lock().unwrap() = Some(hook);
    }

    /// Get the number of times a method was called.
    pub fn get_call_count(&self, method: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        *counts.get(method).unwrap_or(&0)
    }

    /// Reset all call counts.
    pub fn reset_call_counts(&self) {
        let mut counts = self.call_counts.lock().unwrap();
        counts.clear();
    }

    fn track_call(&self, method: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
    }

    fn take_failure(&self, method: &str) -> EngineResult<()> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(method) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(SearchEngineError::Timeout)
            }
            _ => Ok(()),
        }
    }
}

impl Default for MockSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for MockSearchEngine {
    async fn ensure_index(&self, index: &str) -> EngineResult<()> {
        self.track_call("ensure_index");
        self.take_failure("ensure_index")?;
        self.inner.ensure_index(index).await
    }

    async fn delete_index(&self, index: &str) -> EngineResult<()> {
        self.track_call("delete_index");
        self.take_failure("delete_index")?;
        self.inner.delete_index(index).await
    }

    async fn get(&self, index: &str, id: &str) -> EngineResult<Option<StoredHit>> {
        self.track_call("get");
        self.take_failure("get")?;
        self.inner.get(index, id).await
    }

    async fn put_conditional(
        &self,
        index: &str,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> EngineResult<SeqToken> {
        self.track_call("put_conditional");
        let hook = self.before_put.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        self.take_failure("put_conditional")?;
        let token = self.inner.put_conditional(index, id, doc, expected).await?;
        let hook = self.after_put.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        Ok(token)
    }

    async fn clear_index(&self, index: &str) -> EngineResult<u64> {
        self.track_call("clear_index");
        self.take_failure("clear_index")?;
        self.inner.clear_index(index).await
    }

    async fn candidates(
        &self,
        index: &str,
        query: &str,
        in_paths: bool,
        in_values: bool,
        limit: usize,
    ) -> EngineResult<Vec<StoredHit>> {
        self.track_call("candidates");
        self.take_failure("candidates")?;
        self.inner
            .candidates(index, query, in_paths, in_values, limit)
            .await
    }

    async fn count(&self, index: &str) -> EngineResult<u64> {
        self.track_call("count");
        self.take_failure("count")?;
        self.inner.count(index).await
    }
}
