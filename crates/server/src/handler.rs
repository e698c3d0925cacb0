//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the cache tools.
use std::sync::Arc;

use crate::controller::CacheController;
use crate::tools::cache::{
    CacheCheckParams, CacheDomainsParams, CacheFetchParams, CachePurgeParams, CacheRemoveParams, CacheToggleParams,
    check_impl, clear_impl, domains_impl, fetch_impl, purge_impl, remove_impl, status_impl, toggle_impl,
};

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

/// The main MCP server handler for stash.
#[derive(Clone)]
pub struct StashServer {
    controller: Arc<CacheController>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl StashServer {
    /// Create a new server handler around a shared controller.
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self { controller, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Download a page and its stylesheets, scripts and images into the local cache. The URL is trimmed of surrounding whitespace and otherwise used verbatim as the cache key, so ' https://x/ ' and 'https://x/' share one entry. Returns stored paths and any sub-resources that failed."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.controller, params.0).await
    }

    #[tool(description = "List cached pages with their storage keys, timestamps and freshness, plus interception settings.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.controller)
    }

    #[tool(description = "Delete every cached page and reset the manifest.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.controller).await
    }

    #[tool(description = "Enable or disable serving cached pages in place of network requests.")]
    async fn cache_toggle_interception(&self, params: Parameters<CacheToggleParams>) -> Result<CallToolResult, McpError> {
        toggle_impl(&self.controller, params.0)
    }

    #[tool(
        description = "Decide whether an outbound request would be redirected to a cached file or sent to the network. Never fetches."
    )]
    async fn cache_intercept_check(&self, params: Parameters<CacheCheckParams>) -> Result<CallToolResult, McpError> {
        check_impl(&self.controller, params.0)
    }

    #[tool(description = "Add or remove hostnames eligible for interception. An empty list means every host.")]
    async fn cache_domains(&self, params: Parameters<CacheDomainsParams>) -> Result<CallToolResult, McpError> {
        domains_impl(&self.controller, params.0)
    }

    #[tool(description = "Remove one cached page by its URL, trimmed of surrounding whitespace and otherwise exact.")]
    async fn cache_remove(&self, params: Parameters<CacheRemoveParams>) -> Result<CallToolResult, McpError> {
        remove_impl(&self.controller, params.0).await
    }

    #[tool(description = "Delete cached pages older than max_age_secs (default: the configured max age).")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.controller, params.0).await
    }
}

impl ServerHandler for StashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "stash".into(),
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
