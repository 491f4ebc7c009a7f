mod memory_index_registry;
mod memory_search_engine;
mod memory_store;
mod traits;

pub use memory_index_registry::MemoryIndexRegistry;
pub use memory_search_engine::MemorySearchEngine;
pub use memory_store::{MemoryDocumentStore, StoreTransaction};
pub use traits::{
    DocumentSnapshot, DocumentStore, IndexRegistry, QueueStats, QueueStore, SearchEngine,
    StoredDocument,
};
