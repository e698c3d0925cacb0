//! cache_remove tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::CacheController;
use crate::tools::json_result;

/// Parameters for the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveParams {
    /// The cached page URL, exactly as it was fetched.
    pub url: String,
}

/// Output from the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveOutput {
    /// False if the URL was not cached.
    pub removed: bool,
}

/// Implementation of the cache_remove tool.
pub async fn remove_impl(controller: &CacheController, params: CacheRemoveParams) -> Result<CallToolResult, McpError> {
    let removed = controller.remove_entry(&params.url).await?;
    json_result(&CacheRemoveOutput { removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{controller_with, example_fetcher};
    use crate::tools::parse_output;
    use stash_core::AppConfig;

    #[tokio::test]
    async fn test_remove_impl() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;
        controller.fetch_and_cache("https://example.com/").await.unwrap();

        let params = CacheRemoveParams { url: "https://example.com/".into() };
        let output: CacheRemoveOutput = parse_output(&remove_impl(&controller, params.clone()).await.unwrap());
        assert!(output.removed);

        let output: CacheRemoveOutput = parse_output(&remove_impl(&controller, params).await.unwrap());
        assert!(!output.removed);
    }
}
