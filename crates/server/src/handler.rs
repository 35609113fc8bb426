//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the edge worker.
use std::sync::Arc;

use crate::tools::edge_fetch::{EdgeFetchParams, fetch_impl};
use crate::tools::edge_lifecycle::{EdgeLifecycleParams, lifecycle_impl};
use crate::tools::edge_queue::queue_impl;
use crate::tools::edge_sync::sync_impl;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use waypost_client::EdgeWorker;

/// The main MCP server handler for waypost.
#[derive(Clone)]
pub struct WaypostServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<EdgeWorker>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WaypostServer {
    /// Create a new server handler around a booted worker.
    pub fn new(worker: Arc<EdgeWorker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    #[tool(
        description = "Serve a request through the edge cache. Classifies method and path, applies the matching \
                       strategy, and reports whether the response came from cache, network, the offline fallback, \
                       or the mutation queue."
    )]
    async fn edge_fetch(&self, params: Parameters<EdgeFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    /// Reconnect/sync trigger.
    #[tool(
        description = "Replay queued writes against the network once. \
                       Delivered entries are removed; failures stay queued."
    )]
    async fn edge_sync(&self) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker).await
    }

    #[tool(description = "List writes waiting in the durable mutation queue, oldest first.")]
    async fn edge_queue(&self) -> Result<CallToolResult, McpError> {
        queue_impl(&self.worker).await
    }

    #[tool(
        description = "Run a cache lifecycle step: 'install' precaches the manifest, 'activate' evicts other versions."
    )]
    async fn edge_lifecycle(&self, params: Parameters<EdgeLifecycleParams>) -> Result<CallToolResult, McpError> {
        lifecycle_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for WaypostServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "waypost".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
