use super::occurrences::{match_pairs, merge_matches};
use crate::config::Config;
use crate::error::{RegistryError, SearchError, SearchResult};
use crate::metrics::{Metrics, Timer};
use crate::models::{MatchedKeys, SearchHit, SearchRequest, SearchResponse};
use crate::repositories::{IndexRegistry, SearchEngine};
use std::sync::Arc;

/// Pagination bounds applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Most documents a query may match; broader queries are rejected
    /// rather than answered with a short total
    pub max_candidates: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_candidates: 10_000,
        }
    }
}

impl From<&Config> for PageLimits {
    fn from(config: &Config) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            max_candidates: config.max_search_candidates,
        }
    }
}

/// Serves substring queries against what the reconciler has committed.
pub struct SearchMatcher {
    engine: Arc<dyn SearchEngine>,
    registry: Arc<dyn IndexRegistry>,
    limits: PageLimits,
    metrics: Metrics,
}

impl SearchMatcher {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        registry: Arc<dyn IndexRegistry>,
        limits: PageLimits,
        metrics: Metrics,
    ) -> Self {
        Self {
            engine,
            registry,
            limits,
            metrics,
        }
    }

    fn validate(&self, request: &SearchRequest) -> SearchResult<usize> {
        if request.query.is_empty() {
            return Err(SearchError::InvalidParameters(
                "query cannot be empty".to_string(),
            ));
        }
        if !request.search_in_paths && !request.search_in_values {
            return Err(SearchError::InvalidParameters(
                "at least one of search_in_paths or search_in_values must be true".to_string(),
            ));
        }
        if request.page == 0 {
            return Err(SearchError::InvalidParameters(
                "page is 1-based".to_string(),
            ));
        }
        let page_size = request.page_size.unwrap_or(self.limits.default_page_size);
        if page_size == 0 || page_size > self.limits.max_page_size {
            return Err(SearchError::InvalidParameters(format!(
                "page_size must be between 1 and {}",
                self.limits.max_page_size
            )));
        }
        Ok(page_size)
    }

    /// Run `request` against the index registered as `index_name`.
    ///
    /// Only documents with at least one occurrence count toward `total`;
    /// pages are cut from those documents ordered by id.
    pub async fn search(
        &self,
        index_name: &str,
        request: &SearchRequest,
    ) -> SearchResult<SearchResponse> {
        let page_size = self.validate(request)?;
        let definition = self.registry.get(index_name).await.map_err(|e| match e {
            RegistryError::NotFound(name) => SearchError::IndexNotFound(name),
            other => SearchError::InvalidParameters(other.to_string()),
        })?;

        let timer = Timer::new(format!("search:{}", index_name));
        let cap = self.limits.max_candidates;
        let mut candidates = self
            .engine
            .candidates(
                &definition.target_index,
                &request.query,
                request.search_in_paths,
                request.search_in_values,
                cap.saturating_add(1),
            )
            .await?;
        if candidates.len() > cap {
            tracing::warn!(
                index = %index_name,
                query = %request.query,
                cap,
                "Query exceeds candidate cap"
            );
            return Err(SearchError::TooManyCandidates { limit: cap });
        }
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut matched: Vec<SearchHit> = candidates
            .into_iter()
            .filter_map(|hit| {
                let matches = match_pairs(
                    &hit.document.flat,
                    &request.query,
                    request.search_in_paths,
                    request.search_in_values,
                );
                if matches.is_empty() {
                    return None;
                }
                let matched_keys = if request.merge {
                    MatchedKeys::Merged(merge_matches(matches))
                } else {
                    MatchedKeys::Unmerged(matches)
                };
                Some(SearchHit {
                    id: hit.id,
                    matched_keys,
                })
            })
            .collect();

        let total = matched.len();
        let total_pages = total.div_ceil(page_size);
        let start = (request.page - 1).saturating_mul(page_size).min(total);
        let end = (start + page_size).min(total);
        let results: Vec<SearchHit> = matched.drain(start..end).collect();

        self.metrics.record_search();
        tracing::debug!(
            index = %index_name,
            query = %request.query,
            total,
            page = request.page,
            duration_ms = timer.finish() as u64,
            "Search served"
        );

        Ok(SearchResponse {
            results,
            total,
            page: request.page,
            page_size,
            total_pages,
        })
    }
}
