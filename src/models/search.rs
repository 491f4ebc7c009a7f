//! Search request and response payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_page() -> usize {
    1
}

/// Substring search over flattened documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_true")]
    pub search_in_paths: bool,
    #[serde(default = "default_true")]
    pub search_in_values: bool,
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: usize,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Group occurrences by (key, match_in)
    #[serde(default)]
    pub merge: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_in_paths: true,
            search_in_values: true,
            page: 1,
            page_size: None,
            merge: false,
        }
    }
}

/// Which side of a flat pair an occurrence was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchIn {
    Key,
    Value,
}

/// One occurrence, offsets in characters, `end_index` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedKey {
    pub key: String,
    pub value: String,
    pub match_in: MatchIn,
    pub start_index: usize,
    pub end_index: usize,
}

/// All occurrences in one field, grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedMatch {
    pub key: String,
    pub value: String,
    pub match_in: MatchIn,
    /// Sorted `(start, end)` character ranges
    pub positions: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchedKeys {
    Unmerged(Vec<MatchedKey>),
    Merged(Vec<MergedMatch>),
}

impl MatchedKeys {
    pub fn len(&self) -> usize {
        match self {
            Self::Unmerged(v) => v.len(),
            Self::Merged(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub matched_keys: MatchedKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Number of documents with at least one match
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}
