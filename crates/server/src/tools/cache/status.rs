//! cache_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};

use crate::controller::CacheController;
use crate::tools::json_result;

/// Implementation of the cache_status tool.
pub fn status_impl(controller: &CacheController) -> Result<CallToolResult, McpError> {
    json_result(&controller.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CacheStatus;
    use crate::controller::tests::{controller_with, example_fetcher};
    use crate::tools::parse_output;
    use stash_core::AppConfig;

    #[tokio::test]
    async fn test_status_impl() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;
        controller.fetch_and_cache("https://example.com/").await.unwrap();

        let status: CacheStatus = parse_output(&status_impl(&controller).unwrap());
        assert_eq!(status.entries.len(), 1);
        assert_eq!(status.max_age_secs, 86_400);
        assert!(!status.interception.enabled);
    }
}
