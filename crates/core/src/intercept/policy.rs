//! Eligibility rules for request interception.
//!
//! A request is only ever redirected to the cache if it passes every gate
//! here; all other requests go to the network untouched.

use std::collections::BTreeSet;

use regex::RegexSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Schemes that reach the network and may be served from cache.
pub const INTERCEPTED_SCHEMES: &[&str] = &["http", "https"];

/// Kind of resource a rendering surface is requesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Xhr,
    WebSocket,
    #[default]
    Other,
}

/// Why a request was sent to the network without consulting the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Disabled,
    UnparsableUrl,
    NonNetworkScheme,
    Realtime,
    Bypassed,
    DomainNotListed,
}

impl Skip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skip::Disabled => "disabled",
            Skip::UnparsableUrl => "unparsable_url",
            Skip::NonNetworkScheme => "non_network_scheme",
            Skip::Realtime => "realtime",
            Skip::Bypassed => "bypassed",
            Skip::DomainNotListed => "domain_not_listed",
        }
    }
}

/// Compile bypass patterns into a single matcher.
pub fn compile_bypass(patterns: &[String]) -> Result<RegexSet, regex::Error> {
    RegexSet::new(patterns)
}

/// Apply the eligibility gates, in order, to a parsed request URL.
///
/// An empty `domains` set places no restriction on the host.
pub fn check(
    url: &Url, raw: &str, resource_type: ResourceType, bypass: &RegexSet, domains: &BTreeSet<String>,
) -> Result<(), Skip> {
    if !INTERCEPTED_SCHEMES.contains(&url.scheme()) {
        return Err(Skip::NonNetworkScheme);
    }

    if resource_type == ResourceType::WebSocket {
        return Err(Skip::Realtime);
    }

    if bypass.is_match(raw) {
        return Err(Skip::Bypassed);
    }

    if !domains.is_empty() {
        let host = url.host_str().unwrap_or_default();
        if !domains.contains(host) {
            return Err(Skip::DomainNotListed);
        }
    }

    Ok(())
}

/// Lowercase and trim a hostname for allow-list storage and lookup.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bypass() -> RegexSet {
        compile_bypass(&["/api/".to_string(), r"/socket\.io/".to_string()]).unwrap()
    }

    fn run(raw: &str, resource_type: ResourceType, domains: &[&str]) -> Result<(), Skip> {
        let url = Url::parse(raw).unwrap();
        let domains = domains.iter().map(|d| normalize_domain(d)).collect();
        check(&url, raw, resource_type, &default_bypass(), &domains)
    }

    #[test]
    fn test_plain_page_is_eligible() {
        assert_eq!(run("https://example.com/", ResourceType::MainFrame, &[]), Ok(()));
        assert_eq!(run("http://example.com/style.css", ResourceType::Stylesheet, &[]), Ok(()));
    }

    #[test]
    fn test_non_network_schemes() {
        for raw in [
            "file:///home/user/index.html",
            "about:blank",
            "devtools://devtools/bundled/inspector.html",
            "chrome-extension://abc/page.html",
            "data:text/html,hi",
            "wss://example.com/live",
        ] {
            assert_eq!(run(raw, ResourceType::Other, &[]), Err(Skip::NonNetworkScheme), "{raw}");
        }
    }

    #[test]
    fn test_api_and_realtime_paths() {
        assert_eq!(run("https://example.com/api/users", ResourceType::Xhr, &[]), Err(Skip::Bypassed));
        assert_eq!(
            run("https://example.com/socket.io/?EIO=4&transport=polling", ResourceType::Xhr, &[]),
            Err(Skip::Bypassed)
        );
        assert_eq!(run("https://example.com/live", ResourceType::WebSocket, &[]), Err(Skip::Realtime));
        assert_eq!(run("https://example.com/apiary", ResourceType::MainFrame, &[]), Ok(()));
    }

    #[test]
    fn test_allow_list() {
        assert_eq!(run("https://example.com/", ResourceType::MainFrame, &["example.com"]), Ok(()));
        assert_eq!(run("https://EXAMPLE.com/", ResourceType::MainFrame, &[" Example.COM. "]), Ok(()));
        assert_eq!(
            run("https://other.org/", ResourceType::MainFrame, &["example.com"]),
            Err(Skip::DomainNotListed)
        );
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("  Example.COM. "), "example.com");
    }
}
