//! cache_purge tool implementation.
//!
//! Removes entries older than a maximum age. Staleness alone never deletes
//! anything; this tool is the only way expired entries go away.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::controller::CacheController;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge entries older than this many seconds (default: the configured max age).
    pub max_age_secs: Option<u64>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub purged: usize,
    /// URLs of the deleted entries.
    pub urls: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(controller: &CacheController, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let urls = controller
        .purge_expired(params.max_age_secs.map(Duration::from_secs))
        .await?;

    json_result(&CachePurgeOutput { purged: urls.len(), urls })
}
