//! Error types for the index synchronization engine.
//!
//! This module defines custom error types using `thiserror` for precise error handling.
//! Each collaborator (document store, search engine, flattener, registry) gets its own
//! enum so callers can tell an expected optimistic-concurrency loss apart from a real
//! failure.

use crate::domain::ValidationError;
use thiserror::Error;

/// Errors raised by the document store and its queue ledger.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Document or queue entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested update cannot be applied to the current document
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// The store cannot serve requests (poisoned lock, backend down)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when talking to the search engine.
#[derive(Error, Debug)]
pub enum SearchEngineError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Search engine returned an unexpected status code
    #[error("Search engine error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Network timeout
    #[error("Request timeout")]
    Timeout,

    /// Index or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conditional write rejected because the target changed since it was read
    #[error("Version conflict on document {id}")]
    VersionConflict { id: String },

    /// Index mapping does not match what the indexer writes
    #[error("Search engine configuration error: {0}")]
    Configuration(String),
}

impl SearchEngineError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::Timeout => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors raised while flattening a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlattenError {
    /// The document contains a leaf type with no canonical text form
    #[error("Unsupported {kind} leaf at '{path}'")]
    UnsupportedLeaf { path: String, kind: &'static str },

    /// NaN or infinite number
    #[error("Non-finite number at '{path}'")]
    NonFiniteNumber { path: String },
}

/// Errors raised while reconciling a single queue entry.
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    SearchEngine(#[from] SearchEngineError),

    /// Document could not be flattened
    #[error("Malformed document: {0}")]
    Malformed(#[from] FlattenError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The entry's collection is not monitored by the index being reconciled
    #[error("Source {db}.{coll} is not monitored by index {index}")]
    UnmonitoredSource {
        index: String,
        db: String,
        coll: String,
    },
}

/// Errors from the administrative index registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An index definition with this name already exists
    #[error("Index already exists: {0}")]
    AlreadyExists(String),

    /// No index definition with this name
    #[error("Index not found: {0}")]
    NotFound(String),

    /// Another index already drains this source's queue
    #[error("Source {db}.{coll} is already monitored by index {owner}")]
    SourceAlreadyMonitored {
        db: String,
        coll: String,
        owner: String,
    },

    /// Definition failed validation
    #[error("Invalid index definition: {0}")]
    Invalid(String),

    /// Name or id failed domain validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The search engine rejected the target index (fatal, never retried)
    #[error("Search engine rejected index: {0}")]
    Configuration(#[from] SearchEngineError),

    /// Registry storage failure
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Errors that can occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Invalid search parameters
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),

    /// Unknown index name
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// More documents match than one query may examine
    #[error("Query matches more than {limit} documents; use a more specific query")]
    TooManyCandidates { limit: usize },

    /// Candidate retrieval failed
    #[error("Search execution failed: {0}")]
    Engine(#[from] SearchEngineError),
}

/// Errors surfaced by the service layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Engine(#[from] SearchEngineError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Convenience type alias for Results with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience type alias for Results with SearchEngineError
pub type EngineResult<T> = Result<T, SearchEngineError>;

/// Convenience type alias for Results with FlattenError
pub type FlattenResult<T> = Result<T, FlattenError>;

/// Convenience type alias for Results with IndexingError
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Convenience type alias for Results with RegistryError
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with SearchError
pub type SearchResult<T> = Result<T, SearchError>;

/// Convenience type alias for Results with ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;
