//! Data models for documents, queue entries, indexed documents and search payloads.

pub mod document;
pub mod index_definition;
pub mod indexed_document;
pub mod queue_entry;
pub mod search;
pub mod update;

pub use document::DocValue;
pub use index_definition::IndexDefinition;
pub use indexed_document::{FlatPair, IndexedDocument, SeqToken, SourceRef, StoredHit};
pub use queue_entry::{QueueEntry, QueueKey, QueueStatus};
pub use search::{
    MatchIn, MatchedKey, MatchedKeys, MergedMatch, SearchHit, SearchRequest, SearchResponse,
};
pub use update::{UpdateReceipt, UpdateRequest};
