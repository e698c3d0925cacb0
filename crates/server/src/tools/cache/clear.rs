//! cache_clear tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::CacheController;
use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    pub cleared: bool,
}

/// Implementation of the cache_clear tool.
///
/// A storage failure is returned as an error; the cache may then be partly cleared.
pub async fn clear_impl(controller: &CacheController) -> Result<CallToolResult, McpError> {
    controller.clear_cache().await?;
    json_result(&CacheClearOutput { cleared: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{controller_with, example_fetcher};
    use crate::tools::parse_output;
    use stash_core::AppConfig;

    #[tokio::test]
    async fn test_clear_impl() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;
        controller.fetch_and_cache("https://example.com/").await.unwrap();

        let output: CacheClearOutput = parse_output(&clear_impl(&controller).await.unwrap());
        assert!(output.cleared);
        assert!(controller.status().entries.is_empty());
    }
}
