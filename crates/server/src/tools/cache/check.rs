//! cache_intercept_check tool implementation.
//!
//! Asks the interceptor what it would do with one outbound request. This is
//! the per-request hook a rendering surface calls before touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::ResourceType;

use crate::controller::CacheController;
use crate::tools::json_result;

/// Parameters for the cache_intercept_check tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheCheckParams {
    /// The request URL, exactly as the rendering surface would send it.
    pub url: String,

    /// Kind of request (main_frame, stylesheet, script, image, web_socket, ...).
    #[serde(default)]
    pub resource_type: ResourceType,
}

/// Implementation of the cache_intercept_check tool.
pub fn check_impl(controller: &CacheController, params: CacheCheckParams) -> Result<CallToolResult, McpError> {
    json_result(&controller.check_request(&params.url, params.resource_type))
}
