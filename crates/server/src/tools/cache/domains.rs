//! cache_domains tool implementation.
//!
//! Edits the interception allow-list. An empty list intercepts every host.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::CacheController;
use crate::tools::json_result;

/// Parameters for the cache_domains tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheDomainsParams {
    /// Hostnames to add.
    #[serde(default)]
    pub add: Vec<String>,

    /// Hostnames to remove.
    #[serde(default)]
    pub remove: Vec<String>,

    /// Empty the list before applying `remove` and `add`.
    #[serde(default)]
    pub clear: bool,
}

/// Implementation of the cache_domains tool. Returns the resulting state.
pub fn domains_impl(controller: &CacheController, params: CacheDomainsParams) -> Result<CallToolResult, McpError> {
    json_result(&controller.set_domains(&params.add, &params.remove, params.clear))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{StaticFetcher, controller_with};
    use crate::tools::parse_output;
    use stash_core::{AppConfig, InterceptionState};

    #[tokio::test]
    async fn test_domains_impl() {
        let config = AppConfig { intercepted_domains: vec!["old.example".into()], ..Default::default() };
        let (_dir, controller) = controller_with(StaticFetcher::default(), config).await;

        let params = CacheDomainsParams { add: vec!["example.com".into()], ..Default::default() };
        let state: InterceptionState = parse_output(&domains_impl(&controller, params).unwrap());
        assert_eq!(state.intercepted_domains.len(), 2);

        let params = CacheDomainsParams { clear: true, ..Default::default() };
        let state: InterceptionState = parse_output(&domains_impl(&controller, params).unwrap());
        assert!(state.intercepted_domains.is_empty());
    }

    #[test]
    fn test_params_default_to_no_change() {
        let params: CacheDomainsParams = serde_json::from_str("{}").unwrap();
        assert!(params.add.is_empty() && params.remove.is_empty() && !params.clear);
    }
}
