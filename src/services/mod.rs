//! Application service layer.
//!
//! Services validate requests and orchestrate the store, registry, search
//! engine and reconciler. They are the boundary between the MCP handlers and
//! the storage layer.

mod document_service;
mod index_service;

pub use document_service::{DocumentService, DocumentServiceImpl};
pub use index_service::{IndexService, IndexServiceImpl, IndexStatus, SourceStatus};
