//! MCP tool handlers for the index synchronization server.
//!
//! This module implements all the MCP tools using the rmcp SDK's tool_router pattern.

use crate::error::{RegistryError, SearchError, ServiceError, StoreError};
use crate::models::{IndexDefinition, SearchRequest, SourceRef, UpdateRequest};
use crate::reconciler::RebuildMode;
use crate::search::SearchMatcher;
use crate::services::{DocumentService, IndexService};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// MCP server exposing document writes, index administration and search.
#[derive(Clone)]
pub struct IndexSyncMcpServer {
    document_service: Arc<dyn DocumentService>,
    index_service: Arc<dyn IndexService>,
    search: Arc<SearchMatcher>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for IndexSyncMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "flat-index-sync".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some("Writes documents to a document store and keeps a character-level substring search index converged with them. Writes return immediately; indexing happens in the background.".into()),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SourceParam {
    db_name: String,
    coll_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IndexDefinitionParams {
    /// Registry name of the index
    name: String,
    /// Name in the search engine; defaults to `name`
    #[serde(default)]
    target_index: Option<String>,
    sources: Vec<SourceParam>,
}

impl IndexDefinitionParams {
    fn into_definition(self) -> IndexDefinition {
        let target = self.target_index.unwrap_or_else(|| self.name.clone());
        let sources = self
            .sources
            .into_iter()
            .map(|s| SourceRef::new(s.db_name, s.coll_name))
            .collect();
        IndexDefinition::new(self.name, target, sources)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IndexNameParams {
    name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateDocumentParams {
    db: String,
    collection: String,
    doc_id: String,
    /// Dotted path to new value
    update_dict: BTreeMap<String, Value>,
    #[serde(default)]
    update_index: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteDocumentParams {
    db: String,
    collection: String,
    doc_id: String,
    #[serde(default)]
    update_index: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchIndexParams {
    index: String,
    #[serde(flatten)]
    request: SearchRequest,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RebuildIndexParams {
    name: String,
    mode: RebuildMode,
    #[serde(default)]
    max_docs: Option<usize>,
}

// Helper function to convert errors to MCP errors
fn to_mcp_error(e: impl std::fmt::Display) -> McpError {
    McpError {
        code: ErrorCode::INTERNAL_ERROR,
        message: Cow::from(e.to_string()),
        data: None,
    }
}

/// Caller mistakes map to invalid-params, everything else is internal.
fn service_error(e: ServiceError) -> McpError {
    let code = match &e {
        ServiceError::InvalidRequest(_)
        | ServiceError::Registry(
            RegistryError::AlreadyExists(_)
            | RegistryError::NotFound(_)
            | RegistryError::SourceAlreadyMonitored { .. }
            | RegistryError::Invalid(_)
            | RegistryError::Validation(_),
        )
        | ServiceError::Store(StoreError::NotFound(_) | StoreError::InvalidUpdate(_))
        | ServiceError::Search(
            SearchError::InvalidParameters(_)
            | SearchError::IndexNotFound(_)
            | SearchError::TooManyCandidates { .. },
        ) => ErrorCode::INVALID_PARAMS,
        _ => ErrorCode::INTERNAL_ERROR,
    };
    McpError {
        code,
        message: Cow::from(e.to_string()),
        data: None,
    }
}

fn json_result(value: &impl Serialize) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(to_mcp_error)?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl IndexSyncMcpServer {
    pub fn new(
        document_service: Arc<dyn DocumentService>,
        index_service: Arc<dyn IndexService>,
        search: Arc<SearchMatcher>,
    ) -> Self {
        Self {
            document_service,
            index_service,
            search,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Register a search index that monitors one or more (database, collection) sources. The target index is created or verified in the search engine first; a mapping mismatch is reported and the index is not registered."
    )]
    async fn create_index(
        &self,
        params: Parameters<IndexDefinitionParams>,
    ) -> Result<CallToolResult, McpError> {
        let created = self
            .index_service
            .create_index(params.0.into_definition())
            .await
            .map_err(service_error)?;
        json_result(&created)
    }

    #[tool(
        description = "Replace an index definition's target index and sources. A new target index is created or verified first. Already indexed documents are not moved; run a full rebuild afterwards to populate a new target."
    )]
    async fn update_index(
        &self,
        params: Parameters<IndexDefinitionParams>,
    ) -> Result<CallToolResult, McpError> {
        let updated = self
            .index_service
            .update_index(params.0.into_definition())
            .await
            .map_err(service_error)?;
        json_result(&updated)
    }

    #[tool(description = "Drop an index's search engine index and remove its definition")]
    async fn delete_index(
        &self,
        params: Parameters<IndexNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let deleted = self
            .index_service
            .delete_index(&params.0.name)
            .await
            .map_err(service_error)?;
        json_result(&deleted)
    }

    #[tool(description = "List all registered index definitions")]
    async fn list_indexes(&self) -> Result<CallToolResult, McpError> {
        let indexes = self
            .index_service
            .list_indexes()
            .await
            .map_err(service_error)?;
        json_result(&serde_json::json!({
            "count": indexes.len(),
            "indexes": indexes,
        }))
    }

    #[tool(
        description = "Set-field upsert of dotted paths into a document. Returns {docId, updateAt, updateVersion}. With update_index=true the reconciler is notified right away; otherwise the next periodic pass indexes the change."
    )]
    async fn update_document(
        &self,
        params: Parameters<UpdateDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let request = UpdateRequest {
            update_dict: params.update_dict,
            update_index: params.update_index,
        };
        let receipt = self
            .document_service
            .update_document(&params.db, &params.collection, &params.doc_id, request)
            .await
            .map_err(service_error)?;
        json_result(&receipt)
    }

    #[tool(description = "Delete a document; the deletion propagates to the search index asynchronously")]
    async fn delete_document(
        &self,
        params: Parameters<DeleteDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let receipt = self
            .document_service
            .delete_document(
                &params.db,
                &params.collection,
                &params.doc_id,
                params.update_index,
            )
            .await
            .map_err(service_error)?;
        json_result(&receipt)
    }

    #[tool(
        description = "Case-sensitive substring search over flattened document paths and/or values. Returns every occurrence with character offsets (end exclusive), paginated by matching document ordered by id. merge=true groups occurrences per (key, match_in)."
    )]
    async fn search_index(
        &self,
        params: Parameters<SearchIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let response = self
            .search
            .search(&params.index, &params.request)
            .await
            .map_err(|e| service_error(e.into()))?;
        json_result(&response)
    }

    #[tool(
        description = "Rebuild an index. mode=full clears the search index and reindexes every monitored document; mode=incremental only processes pending entries. Both go in ascending update version order and stop after max_docs."
    )]
    async fn rebuild_index(
        &self,
        params: Parameters<RebuildIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let report = self
            .index_service
            .rebuild_index(&params.name, params.mode, params.max_docs)
            .await
            .map_err(service_error)?;
        json_result(&report)
    }

    #[tool(description = "Queue statistics per source and indexed document count for an index")]
    async fn index_status(
        &self,
        params: Parameters<IndexNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let status = self
            .index_service
            .index_status(&params.0.name)
            .await
            .map_err(service_error)?;
        json_result(&serde_json::json!({
            "status": status,
            "pending": status.pending(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::reconciler::Reconciler;
    use crate::repositories::{
        MemoryDocumentStore, MemoryIndexRegistry, MemorySearchEngine, SearchEngine,
    };
    use crate::search::PageLimits;
    use crate::services::{DocumentServiceImpl, IndexServiceImpl};
    use serde::de::DeserializeOwned;
    use serde_json::json;

    fn server() -> (IndexSyncMcpServer, Arc<MemorySearchEngine>) {
        let store = Arc::new(MemoryDocumentStore::new(Some(0)));
        let engine = Arc::new(MemorySearchEngine::new());
        let registry = Arc::new(MemoryIndexRegistry::new());
        let metrics = Metrics::new();
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            store.clone(),
            engine.clone(),
            registry.clone(),
            metrics.clone(),
        ));
        let server = IndexSyncMcpServer::new(
            Arc::new(DocumentServiceImpl::new(store.clone(), None)),
            Arc::new(IndexServiceImpl::new(
                registry.clone(),
                engine.clone(),
                store,
                reconciler,
            )),
            Arc::new(SearchMatcher::new(
                engine.clone(),
                registry,
                PageLimits::default(),
                metrics,
            )),
        );
        (server, engine)
    }

    /// Tool arguments as an MCP client would send them.
    fn params<T: DeserializeOwned>(value: Value) -> Parameters<T> {
        Parameters(serde_json::from_value(value).unwrap())
    }

    fn payload(result: CallToolResult) -> Value {
        let text = &result.content[0].as_text().unwrap().text;
        serde_json::from_str(text).unwrap()
    }

    fn notes_index() -> Value {
        json!({
            "name": "notes",
            "target_index": "notes-v1",
            "sources": [{"db_name": "app", "coll_name": "notes"}]
        })
    }

    #[test]
    fn test_every_tool_is_routed() {
        let (server, _) = server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "create_index",
                "delete_document",
                "delete_index",
                "index_status",
                "list_indexes",
                "rebuild_index",
                "search_index",
                "update_document",
                "update_index",
            ]
        );
    }

    #[tokio::test]
    async fn test_write_rebuild_search_round() {
        let (server, _) = server();

        let created = payload(server.create_index(params(notes_index())).await.unwrap());
        assert_eq!(created["name"], "notes");
        assert_eq!(created["targetIndex"], "notes-v1");
        assert_eq!(created["sources"][0]["dbName"], "app");

        let receipt = payload(
            server
                .update_document(params(json!({
                    "db": "app",
                    "collection": "notes",
                    "doc_id": "n1",
                    "update_dict": {"title": "hello world", "meta.tags": ["world"]}
                })))
                .await
                .unwrap(),
        );
        assert_eq!(receipt["docId"], "n1");
        assert_eq!(receipt["updateVersion"], 1);

        let status = payload(
            server
                .index_status(params(json!({"name": "notes"})))
                .await
                .unwrap(),
        );
        assert_eq!(status["pending"], 1);
        assert_eq!(status["status"]["indexedDocuments"], 0);

        let report = payload(
            server
                .rebuild_index(params(json!({"name": "notes", "mode": "incremental"})))
                .await
                .unwrap(),
        );
        assert_eq!(report["indexed"], 1);
        assert_eq!(report["processed"].as_array().unwrap().len(), 1);

        let found = payload(
            server
                .search_index(params(json!({
                    "index": "notes",
                    "query": "world",
                    "search_in_paths": false
                })))
                .await
                .unwrap(),
        );
        assert_eq!(found["total"], 1);
        assert_eq!(found["total_pages"], 1);
        let keys = found["results"][0]["matched_keys"].as_array().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["key"], "meta.tags.0");
        assert_eq!(keys[1]["key"], "title");
        assert_eq!(keys[1]["match_in"], "value");
        assert_eq!(keys[1]["start_index"], 6);
        assert_eq!(keys[1]["end_index"], 11);

        let deleted = payload(
            server
                .delete_document(params(json!({
                    "db": "app",
                    "collection": "notes",
                    "doc_id": "n1"
                })))
                .await
                .unwrap(),
        );
        assert_eq!(deleted["updateVersion"], 2);
        server
            .rebuild_index(params(json!({"name": "notes", "mode": "incremental"})))
            .await
            .unwrap();
        let gone = payload(
            server
                .search_index(params(json!({"index": "notes", "query": "world"})))
                .await
                .unwrap(),
        );
        assert_eq!(gone["total"], 0);
    }

    #[tokio::test]
    async fn test_index_administration_tools() {
        let (server, engine) = server();
        server.create_index(params(notes_index())).await.unwrap();

        let updated = payload(
            server
                .update_index(params(json!({
                    "name": "notes",
                    "target_index": "notes-v2",
                    "sources": [
                        {"db_name": "app", "coll_name": "notes"},
                        {"db_name": "app", "coll_name": "drafts"}
                    ]
                })))
                .await
                .unwrap(),
        );
        assert_eq!(updated["targetIndex"], "notes-v2");
        assert_eq!(updated["sources"].as_array().unwrap().len(), 2);
        assert_eq!(engine.count("notes-v2").await.unwrap(), 0);

        let listed = payload(server.list_indexes().await.unwrap());
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["indexes"][0]["targetIndex"], "notes-v2");

        let dropped = payload(
            server
                .delete_index(params(json!({"name": "notes"})))
                .await
                .unwrap(),
        );
        assert_eq!(dropped["name"], "notes");
        assert!(engine.count("notes-v2").await.is_err());
        let listed = payload(server.list_indexes().await.unwrap());
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_caller_mistakes_are_invalid_params() {
        let (server, _) = server();
        server.create_index(params(notes_index())).await.unwrap();

        let empty_query = server
            .search_index(params(json!({"index": "notes", "query": ""})))
            .await
            .unwrap_err();
        assert_eq!(empty_query.code, ErrorCode::INVALID_PARAMS);
        assert!(empty_query.message.contains("query"));

        let unknown_index = server
            .search_index(params(json!({"index": "missing", "query": "a"})))
            .await
            .unwrap_err();
        assert_eq!(unknown_index.code, ErrorCode::INVALID_PARAMS);

        let duplicate = server.create_index(params(notes_index())).await.unwrap_err();
        assert_eq!(duplicate.code, ErrorCode::INVALID_PARAMS);

        let operator_path = server
            .update_document(params(json!({
                "db": "app",
                "collection": "notes",
                "doc_id": "n1",
                "update_dict": {"$set": 1}
            })))
            .await
            .unwrap_err();
        assert_eq!(operator_path.code, ErrorCode::INVALID_PARAMS);

        let missing_document = server
            .delete_document(params(json!({
                "db": "app",
                "collection": "notes",
                "doc_id": "nobody"
            })))
            .await
            .unwrap_err();
        assert_eq!(missing_document.code, ErrorCode::INVALID_PARAMS);

        let unknown_update = server
            .update_index(params(json!({
                "name": "missing",
                "sources": [{"db_name": "app", "coll_name": "other"}]
            })))
            .await
            .unwrap_err();
        assert_eq!(unknown_update.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_engine_failures_are_internal_errors() {
        let (server, engine) = server();
        server.create_index(params(notes_index())).await.unwrap();

        // Target index dropped behind the registry's back
        engine.delete_index("notes-v1").await.unwrap();

        let err = server
            .search_index(params(json!({"index": "notes", "query": "a"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);

        let err = server
            .index_status(params(json!({"name": "notes"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }
}
