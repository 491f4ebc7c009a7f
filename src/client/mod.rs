//! HTTP client for an Elasticsearch-compatible search engine.
//!
//! This module provides a synchronous HTTP client that can be used from async contexts
//! via `tokio::task::spawn_blocking`. The client handles authentication, error mapping,
//! and the optimistic-concurrency parameters (`if_seq_no` / `if_primary_term`) the
//! reconciler depends on.

mod async_wrapper;
pub use async_wrapper::ElasticSearchEngine;

use crate::config::Config;
use crate::error::{EngineResult, SearchEngineError};
use crate::metrics::Metrics;
use crate::models::{IndexedDocument, SeqToken, StoredHit};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Response body of `GET /{index}/_doc/{id}`.
#[derive(Debug, Deserialize)]
struct GetDocResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_seq_no", default)]
    seq_no: Option<u64>,
    #[serde(rename = "_primary_term", default)]
    primary_term: Option<u64>,
    #[serde(rename = "_source", default)]
    source: Option<IndexedDocument>,
}

/// Response body of a single-document write.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(rename = "_seq_no")]
    seq_no: u64,
    #[serde(rename = "_primary_term")]
    primary_term: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHitBody>,
}

#[derive(Debug, Deserialize)]
struct SearchHitBody {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_seq_no")]
    seq_no: u64,
    #[serde(rename = "_primary_term")]
    primary_term: u64,
    #[serde(rename = "_source")]
    source: IndexedDocument,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Mapping every target index is created with.
///
/// `flat.path` and `flat.value` must be `keyword` so wildcard queries see the
/// exact, case-preserved text.
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "flat": {
                    "properties": {
                        "path": {"type": "keyword"},
                        "value": {"type": "keyword"}
                    }
                },
                "updateVersion": {"type": "long"},
                "updateAt": {"type": "long"},
                "updateAtTimeZone": {"type": "integer"},
                "deleted": {"type": "boolean"},
                "source": {
                    "properties": {
                        "dbName": {"type": "keyword"},
                        "collName": {"type": "keyword"}
                    }
                }
            }
        }
    })
}

/// Verify an existing index's mapping is compatible with [`index_mapping`].
///
/// `body` is the response of `GET /{index}/_mapping`.
pub fn check_mapping(index: &str, body: &Value) -> EngineResult<()> {
    let properties = body
        .get(index)
        .and_then(|i| i.pointer("/mappings/properties"))
        .ok_or_else(|| {
            SearchEngineError::Configuration(format!("index {} has no mapping properties", index))
        })?;

    let expected = [
        ("/flat/properties/path/type", "keyword"),
        ("/flat/properties/value/type", "keyword"),
        ("/updateVersion/type", "long"),
    ];
    for (pointer, ty) in expected {
        let actual = properties.pointer(pointer).and_then(Value::as_str);
        if actual != Some(ty) {
            return Err(SearchEngineError::Configuration(format!(
                "index {}: field {} must be {}, found {}",
                index,
                pointer.trim_start_matches('/').replace("/properties/", ".").replace("/type", ""),
                ty,
                actual.unwrap_or("nothing")
            )));
        }
    }
    Ok(())
}

/// Clause excluding tombstones from searches and counts.
fn exclude_tombstones() -> Value {
    json!([{"term": {"deleted": true}}])
}

/// Escape wildcard metacharacters so the query is matched literally.
fn escape_wildcard(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// HTTP client for an Elasticsearch-compatible engine.
///
/// This client uses `ureq` for synchronous HTTP requests and can be called
/// from async contexts using `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct ElasticClient {
    base_url: String,

    /// Sent as `Authorization: ApiKey ...` when present
    api_key: Option<String>,

    agent: Arc<ureq::Agent>,

    metrics: Metrics,
}

impl ElasticClient {
    /// Create a client from configuration, or `None` when no engine URL is set.
    pub fn from_config(config: &Config, metrics: Metrics) -> Option<Self> {
        let base_url = config.search_engine_url.clone()?;
        Some(Self::new(
            base_url,
            config.search_engine_api_key.clone(),
            Duration::from_secs(config.request_timeout),
            metrics,
        ))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.into(),
            api_key,
            agent: Arc::new(agent),
            metrics,
        }
    }

    /// Create a client with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String) -> Self {
        Self::new(base_url, None, Duration::from_secs(10), Metrics::new())
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    fn doc_path(index: &str, id: &str) -> String {
        format!("/{}/_doc/{}", index, urlencoding::encode(id))
    }

    /// Execute a request, recording metrics. `subject` names the index or
    /// document for error messages.
    fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        subject: &str,
    ) -> EngineResult<ureq::Response> {
        let start = Instant::now();
        let url = self.build_url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("ApiKey {}", key));
        }

        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
        .map_err(|e| self.map_error(e, subject));

        let duration = start.elapsed();
        if let Err(e) = &result {
            // Conflicts and misses are ordinary control flow for the caller
            if !matches!(
                e,
                SearchEngineError::VersionConflict { .. } | SearchEngineError::NotFound(_)
            ) {
                tracing::warn!("{} {} - Error: {}", method, url, e);
            }
            self.metrics.record_http_error();
        }
        self.metrics.record_http_request(duration);

        result
    }

    /// Map a ureq error to a SearchEngineError.
    fn map_error(&self, error: ureq::Error, subject: &str) -> SearchEngineError {
        match error {
            ureq::Error::Status(code, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());

                match code {
                    404 if message.contains("index_not_found_exception") => {
                        SearchEngineError::NotFound(format!("index {}", subject))
                    }
                    404 => SearchEngineError::NotFound(subject.to_string()),
                    409 => SearchEngineError::VersionConflict {
                        id: subject.to_string(),
                    },
                    _ => SearchEngineError::ApiError {
                        status: code,
                        message,
                    },
                }
            }
            ureq::Error::Transport(transport) => {
                if transport.kind() == ureq::ErrorKind::ConnectionFailed {
                    SearchEngineError::HttpError("Connection failed".to_string())
                } else if transport.kind() == ureq::ErrorKind::Io {
                    SearchEngineError::Timeout
                } else {
                    SearchEngineError::HttpError(transport.to_string())
                }
            }
        }
    }

    fn read_json<T: for<'de> Deserialize<'de>>(response: ureq::Response) -> EngineResult<T> {
        let body = response
            .into_string()
            .map_err(|e| SearchEngineError::HttpError(e.to_string()))?;
        serde_json::from_str(&body).map_err(SearchEngineError::JsonError)
    }

    // ========================= Index Operations =========================

    /// Create the index with [`index_mapping`], or verify an existing one.
    pub fn ensure_index(&self, index: &str) -> EngineResult<()> {
        match self.send("GET", &format!("/{}/_mapping", index), None, index) {
            Ok(response) => {
                let body: Value = Self::read_json(response)?;
                check_mapping(index, &body)
            }
            Err(SearchEngineError::NotFound(_)) => {
                tracing::info!(index = %index, "Creating search index");
                self.send("PUT", &format!("/{}", index), Some(&index_mapping()), index)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn delete_index(&self, index: &str) -> EngineResult<()> {
        self.send("DELETE", &format!("/{}", index), None, index)?;
        Ok(())
    }

    /// Remove every document, returning the number removed.
    pub fn clear_index(&self, index: &str) -> EngineResult<u64> {
        let body = json!({"query": {"match_all": {}}});
        let response = self.send(
            "POST",
            &format!("/{}/_delete_by_query?refresh=true&conflicts=proceed", index),
            Some(&body),
            index,
        )?;
        let parsed: DeleteByQueryResponse = Self::read_json(response)?;
        Ok(parsed.deleted)
    }

    /// Number of live documents.
    pub fn count(&self, index: &str) -> EngineResult<u64> {
        let body = json!({"query": {"bool": {"must_not": exclude_tombstones()}}});
        let response = self.send("POST", &format!("/{}/_count", index), Some(&body), index)?;
        let parsed: CountResponse = Self::read_json(response)?;
        Ok(parsed.count)
    }

    // ========================= Document Operations =========================

    /// Fetch a document with its sequence token, `None` when absent.
    pub fn get_document(&self, index: &str, id: &str) -> EngineResult<Option<StoredHit>> {
        let response = match self.send("GET", &Self::doc_path(index, id), None, id) {
            Ok(response) => response,
            Err(SearchEngineError::NotFound(msg)) if msg.starts_with("index ") => {
                return Err(SearchEngineError::NotFound(format!("index {}", index)))
            }
            Err(SearchEngineError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let parsed: GetDocResponse = Self::read_json(response)?;
        match (parsed.found, parsed.source, parsed.seq_no, parsed.primary_term) {
            (true, Some(document), Some(seq_no), Some(primary_term)) => Ok(Some(StoredHit {
                id: parsed.id,
                document,
                token: SeqToken {
                    seq_no,
                    primary_term,
                },
            })),
            _ => Ok(None),
        }
    }

    /// Create-only write without a token, conditional replace with one.
    pub fn put_document(
        &self,
        index: &str,
        id: &str,
        doc: &IndexedDocument,
        expected: Option<SeqToken>,
    ) -> EngineResult<SeqToken> {
        let params = match expected {
            None => "op_type=create".to_string(),
            Some(token) => format!(
                "if_seq_no={}&if_primary_term={}",
                token.seq_no, token.primary_term
            ),
        };
        let path = format!("{}?{}&refresh=wait_for", Self::doc_path(index, id), params);
        let body = serde_json::to_value(doc)?;
        let response = self.send("PUT", &path, Some(&body), id)?;
        let parsed: WriteResponse = Self::read_json(response)?;
        Ok(SeqToken {
            seq_no: parsed.seq_no,
            primary_term: parsed.primary_term,
        })
    }

    /// Live documents with a path and/or value containing `query`, ordered by id.
    ///
    /// Hits are sorted by index order rather than score, so the same `limit`
    /// always selects the same documents for an unchanged index.
    pub fn search_candidates(
        &self,
        index: &str,
        query: &str,
        in_paths: bool,
        in_values: bool,
        limit: usize,
    ) -> EngineResult<Vec<StoredHit>> {
        let pattern = format!("*{}*", escape_wildcard(query));
        let mut should = Vec::new();
        if in_paths {
            should.push(json!({"wildcard": {"flat.path": {"value": pattern}}}));
        }
        if in_values {
            should.push(json!({"wildcard": {"flat.value": {"value": pattern}}}));
        }
        let body = json!({
            "size": limit,
            "seq_no_primary_term": true,
            "sort": ["_doc"],
            "query": {"bool": {
                "should": should,
                "minimum_should_match": 1,
                "must_not": exclude_tombstones()
            }}
        });

        let response = self.send("POST", &format!("/{}/_search", index), Some(&body), index)?;
        let parsed: SearchResponseBody = Self::read_json(response)?;
        let mut hits: Vec<StoredHit> = parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| StoredHit {
                id: hit.id,
                document: hit.source,
                token: SeqToken {
                    seq_no: hit.seq_no,
                    primary_term: hit.primary_term,
                },
            })
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }
}
