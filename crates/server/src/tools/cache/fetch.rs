//! cache_fetch tool implementation.
//!
//! Downloads a page plus its stylesheets, scripts and images into the cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::CacheController;
use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute http(s) URL of the page. Surrounding whitespace is trimmed;
    /// the rest of the string is the cache key, unnormalized.
    pub url: String,
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(controller: &CacheController, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url must not be empty".into()).into());
    }

    let outcome = controller.fetch_and_cache(&params.url).await?;
    json_result(&outcome)
}
