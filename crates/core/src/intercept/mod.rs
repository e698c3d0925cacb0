//! Request interception against the page cache.
//!
//! ### Decision
//! - Disabled: every request proceeds to the network.
//! - Enabled: non-HTTP(S) schemes, websocket requests, bypass-pattern matches
//!   and hosts outside a non-empty allow-list proceed.
//! - Otherwise a fresh cached document for the exact URL redirects the request
//!   to its `file://` location; anything else proceeds.
//!
//! ### Constraints
//! - Decisions are synchronous and only read the in-memory manifest plus one
//!   file stat. There is no network access and no fetch on a miss.
//! - Any internal failure fails open to "proceed".

pub mod policy;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use regex::RegexSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

pub use policy::{ResourceType, Skip};

use crate::Error;
use crate::cache::ResourceStore;
use crate::config::AppConfig;

/// Interception switch and host allow-list, owned by one interceptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterceptionState {
    pub enabled: bool,
    /// Hostnames eligible for interception. Empty means no restriction.
    pub intercepted_domains: BTreeSet<String>,
}

impl InterceptionState {
    pub fn new(enabled: bool, domains: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let intercepted_domains = domains
            .into_iter()
            .map(|d| policy::normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        Self { enabled, intercepted_domains }
    }
}

/// An outbound request as seen by the rendering surface's network hook.
#[derive(Debug, Clone, Copy)]
pub struct InterceptRequest<'a> {
    pub url: &'a str,
    pub resource_type: ResourceType,
}

impl<'a> InterceptRequest<'a> {
    pub fn new(url: &'a str, resource_type: ResourceType) -> Self {
        Self { url, resource_type }
    }
}

/// What the network hook should do with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InterceptDecision {
    /// Let the request reach the network.
    Proceed,
    /// Serve the cached document instead.
    Redirect { redirect_url: String, path: PathBuf },
}

impl InterceptDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, InterceptDecision::Redirect { .. })
    }
}

/// Synchronous cache gate for outbound requests.
#[derive(Debug)]
pub struct RequestInterceptor {
    store: Arc<ResourceStore>,
    state: RwLock<InterceptionState>,
    bypass: RegexSet,
    max_age: Duration,
}

impl RequestInterceptor {
    /// Create an interceptor over `store` with an explicit starting state.
    pub fn new(store: Arc<ResourceStore>, state: InterceptionState, bypass: RegexSet, max_age: Duration) -> Self {
        Self { store, state: RwLock::new(state), bypass, max_age }
    }

    /// Build an interceptor from the loaded configuration.
    pub fn from_config(store: Arc<ResourceStore>, config: &AppConfig) -> Result<Self, Error> {
        let bypass = policy::compile_bypass(&config.bypass_patterns)
            .map_err(|e| Error::InvalidInput(format!("invalid bypass pattern: {e}")))?;
        let state = InterceptionState::new(config.intercept_enabled, &config.intercepted_domains);
        Ok(Self::new(store, state, bypass, config.max_age()))
    }

    /// Decide whether `request` is served from cache or sent to the network.
    pub fn decide(&self, request: &InterceptRequest<'_>) -> InterceptDecision {
        match self.evaluate(request) {
            Ok((redirect_url, path)) => {
                tracing::debug!(url = request.url, redirect = %redirect_url, "serving request from cache");
                InterceptDecision::Redirect { redirect_url, path }
            }
            Err(reason) => {
                tracing::trace!(url = request.url, reason = reason.as_str(), "request proceeds to network");
                InterceptDecision::Proceed
            }
        }
    }

    fn evaluate(&self, request: &InterceptRequest<'_>) -> Result<(String, PathBuf), Proceed> {
        {
            let state = self.state.read();
            if !state.enabled {
                return Err(Proceed::Skipped(Skip::Disabled));
            }

            let url = Url::parse(request.url).map_err(|_| Proceed::Skipped(Skip::UnparsableUrl))?;
            policy::check(&url, request.url, request.resource_type, &self.bypass, &state.intercepted_domains)
                .map_err(Proceed::Skipped)?;
        }

        if !self.store.is_valid(request.url, self.max_age) {
            return Err(if self.store.is_cached(request.url) { Proceed::Stale } else { Proceed::NotCached });
        }

        let path = self.store.primary_path(request.url).ok_or(Proceed::MissingDocument)?;
        let redirect = Url::from_file_path(&path).map_err(|()| Proceed::MissingDocument)?;
        Ok((redirect.to_string(), path))
    }

    /// Turn interception on or off; applies from the next request.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.write().enabled = enabled;
        tracing::info!(enabled, "request interception toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    /// Add a hostname to the allow-list. Returns `false` if already present.
    pub fn add_domain(&self, domain: &str) -> bool {
        let domain = policy::normalize_domain(domain);
        if domain.is_empty() {
            return false;
        }
        self.state.write().intercepted_domains.insert(domain)
    }

    /// Remove a hostname from the allow-list. Returns `false` if absent.
    pub fn remove_domain(&self, domain: &str) -> bool {
        self.state
            .write()
            .intercepted_domains
            .remove(&policy::normalize_domain(domain))
    }

    /// Empty the allow-list, making every host eligible again.
    pub fn clear_domains(&self) {
        self.state.write().intercepted_domains.clear();
    }

    /// Copy of the current state.
    pub fn state(&self) -> InterceptionState {
        self.state.read().clone()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

#[derive(Debug)]
enum Proceed {
    Skipped(Skip),
    NotCached,
    Stale,
    MissingDocument,
}

impl Proceed {
    fn as_str(&self) -> &'static str {
        match self {
            Proceed::Skipped(skip) => skip.as_str(),
            Proceed::NotCached => "not_cached",
            Proceed::Stale => "stale",
            Proceed::MissingDocument => "missing_document",
        }
    }
}
