//! Domain value objects and types.
//!
//! Type-safe wrappers for identifiers that cross the service boundary. These
//! value objects validate at construction time so that an invalid index name or
//! document id never reaches the store or the search engine.

pub mod doc_id;
pub mod errors;
pub mod index_name;

pub use doc_id::DocId;
pub use errors::ValidationError;
pub use index_name::IndexName;
