//! MCP server for the index synchronization engine.
//!
//! Exposes document writes, index administration and search to MCP clients
//! over stdio.

pub mod handlers;

pub use handlers::IndexSyncMcpServer;

use anyhow::Result;
use rmcp::transport::io::stdio;
use rmcp::ServiceExt;

/// Run the MCP server with stdio transport until the client disconnects.
pub async fn run_server(server: IndexSyncMcpServer) -> Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
