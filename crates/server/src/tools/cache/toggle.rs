//! cache_toggle_interception tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::CacheController;
use crate::tools::json_result;

/// Parameters for the cache_toggle_interception tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheToggleParams {
    /// Serve cached pages in place of network requests.
    pub enabled: bool,
}

/// Implementation of the cache_toggle_interception tool.
pub fn toggle_impl(controller: &CacheController, params: CacheToggleParams) -> Result<CallToolResult, McpError> {
    json_result(&controller.toggle_interception(params.enabled))
}
