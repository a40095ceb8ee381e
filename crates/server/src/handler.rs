//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker and the data-access layer.
use crate::tools::{
    CacheGetParams, MedicationsListParams, WorkerFetchParams, WorkerMessageParams, WorkerSyncParams,
    cache_get_impl, cache_stores_impl, fetch_impl, medications_list_impl, message_impl, sync_impl,
};
use medref_client::{MedicationsApi, Worker};
use std::sync::Arc;

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

/// The main MCP server handler for medref-worker.
#[derive(Clone)]
pub struct MedrefServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
    api: Arc<MedicationsApi>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl MedrefServer {
    /// Create a new server handler.
    pub fn new(worker: Arc<Worker>, api: Arc<MedicationsApi>) -> Self {
        Self { tool_router: Self::tool_router(), worker, api }
    }

    #[tool(
        description = "Route a GET request through the offline cache worker. Returns the lane that answered and the response."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a message to the worker. {\"type\": \"CLEAN_CACHE\"} removes expired runtime entries.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a background sync event, refreshing medical data from every sync endpoint.")]
    async fn worker_sync(&self, params: Parameters<WorkerSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Read one stored response by store name and request URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache_get_impl(self.worker.db(), params.0).await
    }

    #[tool(description = "List persistent stores with their entry counts and sizes.")]
    async fn cache_stores(&self) -> Result<CallToolResult, McpError> {
        cache_stores_impl(self.worker.db()).await
    }

    /// Read medication rows, from the session cache, the network, or the offline store.
    #[tool(description = "List rows of a medication table, or one row by id. Works offline once data has been cached.")]
    async fn medications_list(&self, params: Parameters<MedicationsListParams>) -> Result<CallToolResult, McpError> {
        medications_list_impl(&self.api, params.0).await
    }
}

impl ServerHandler for MedrefServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "medref-worker".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::worker;
    use std::time::Duration;

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let worker = worker(true).await;
        let api = MedicationsApi::new(worker.clone(), "https://medref.supabase.co", None, Duration::from_secs(60))
            .unwrap();
        let server = MedrefServer::new(worker, Arc::new(api));

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            ["cache_get", "cache_stores", "medications_list", "worker_fetch", "worker_message", "worker_sync"]
        );
    }
}
