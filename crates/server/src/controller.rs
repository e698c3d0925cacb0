//! Boundary between the tool surface and the cache.
//!
//! [`CacheController`] owns the store, the fetch pipeline and the
//! interceptor, and broadcasts a [`CacheEvent`] after every successful
//! mutation so a front-end can refresh its view.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use stash_client::{CacheOutcome, FetchPipeline};
use stash_core::{
    Error, InterceptDecision, InterceptRequest, InterceptionState, RequestInterceptor, ResourceStore, ResourceType,
};

const EVENT_CAPACITY: usize = 64;

/// Notification that the cache contents changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    Updated { url: String },
    Removed { url: String },
    Cleared,
}

/// One manifest entry as reported by [`CacheController::status`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryStatus {
    pub url: String,
    pub storage_key: String,
    pub cached_at: DateTime<Utc>,
    pub last_validated_at: DateTime<Utc>,
    /// Younger than the configured max age. Says nothing about the
    /// interception switch, the allow-list or the document on disk.
    pub fresh: bool,
}

/// Snapshot of the cache and the interception settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatus {
    pub root: PathBuf,
    pub max_age_secs: u64,
    pub interception: InterceptionState,
    pub entries: Vec<EntryStatus>,
}

pub struct CacheController {
    store: Arc<ResourceStore>,
    pipeline: FetchPipeline,
    interceptor: Arc<RequestInterceptor>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheController {
    pub fn new(store: Arc<ResourceStore>, pipeline: FetchPipeline, interceptor: Arc<RequestInterceptor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, pipeline, interceptor, events }
    }

    /// Receive cache mutation events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Capture `url` and everything it references.
    ///
    /// Surrounding whitespace is trimmed; the trimmed string is the cache key.
    pub async fn fetch_and_cache(&self, url: &str) -> Result<CacheOutcome, Error> {
        let url = url.trim();
        let outcome = self.pipeline.run(url).await?;
        self.notify(CacheEvent::Updated { url: outcome.url.clone() });
        Ok(outcome)
    }

    pub fn status(&self) -> CacheStatus {
        let max_age = self.interceptor.max_age();
        let now = Utc::now();

        let entries = self
            .store
            .snapshot()
            .entries()
            .map(|entry| EntryStatus {
                url: entry.url.clone(),
                storage_key: entry.storage_key.clone(),
                cached_at: entry.cached_at,
                last_validated_at: entry.last_validated_at,
                fresh: entry.is_fresh_at(max_age, now),
            })
            .collect();

        CacheStatus {
            root: self.store.root().to_path_buf(),
            max_age_secs: max_age.as_secs(),
            interception: self.interceptor.state(),
            entries,
        }
    }

    pub async fn clear_cache(&self) -> Result<(), Error> {
        self.store.clear().await?;
        self.notify(CacheEvent::Cleared);
        Ok(())
    }

    pub fn toggle_interception(&self, enabled: bool) -> InterceptionState {
        self.interceptor.set_enabled(enabled);
        self.interceptor.state()
    }

    /// The decision the interceptor makes for this request right now.
    pub fn check_request(&self, url: &str, resource_type: ResourceType) -> InterceptDecision {
        self.interceptor.decide(&InterceptRequest::new(url, resource_type))
    }

    /// Edit the host allow-list. `clear` runs first, then removals, then additions.
    pub fn set_domains(&self, add: &[String], remove: &[String], clear: bool) -> InterceptionState {
        if clear {
            self.interceptor.clear_domains();
        }
        for domain in remove {
            self.interceptor.remove_domain(domain);
        }
        for domain in add {
            if !self.interceptor.add_domain(domain) {
                tracing::debug!(domain = %domain, "domain already listed or blank");
            }
        }

        let state = self.interceptor.state();
        tracing::info!(domains = state.intercepted_domains.len(), "intercepted domains updated");
        state
    }

    /// Drop one cached page. Returns `false` if it was not cached.
    pub async fn remove_entry(&self, url: &str) -> Result<bool, Error> {
        let url = url.trim();
        let removed = self.store.remove(url).await?;
        if removed {
            self.notify(CacheEvent::Removed { url: url.to_string() });
        }
        Ok(removed)
    }

    /// Drop entries older than `max_age`, or the configured window if `None`.
    pub async fn purge_expired(&self, max_age: Option<Duration>) -> Result<Vec<String>, Error> {
        let purged = self
            .store
            .purge_expired(max_age.unwrap_or_else(|| self.interceptor.max_age()))
            .await?;

        for url in &purged {
            self.notify(CacheEvent::Removed { url: url.clone() });
        }
        Ok(purged)
    }

    fn notify(&self, event: CacheEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("no cache event subscribers");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::Bytes;
    use stash_client::fetch::StatusCode;
    use stash_client::{FetchResponse, Fetcher, NoLookup};
    use stash_core::AppConfig;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use url::Url;

    /// Serves fixed bodies; anything else is a 404.
    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        pub pages: HashMap<String, &'static str>,
    }

    impl StaticFetcher {
        pub fn with(mut self, url: &str, body: &'static str) -> Self {
            self.pages.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &Url, _accept: &str) -> Result<FetchResponse, Error> {
            let body = self
                .pages
                .get(url.as_str())
                .ok_or_else(|| Error::HttpError(format!("status 404 for {url}")))?;

            Ok(FetchResponse {
                url: url.clone(),
                final_url: url.clone(),
                status: StatusCode::OK,
                content_type: None,
                bytes: Bytes::from_static(body.as_bytes()),
                fetch_ms: 0,
            })
        }
    }

    pub(crate) const EXAMPLE_HTML: &str =
        r#"<html><head><link rel="stylesheet" href="/style.css"></head><body><img src="/logo.png"></body></html>"#;

    pub(crate) fn example_fetcher() -> StaticFetcher {
        StaticFetcher::default()
            .with("https://example.com/", EXAMPLE_HTML)
            .with("https://example.com/style.css", "body{}")
            .with("https://example.com/logo.png", "PNG")
    }

    pub(crate) async fn controller_with(fetcher: StaticFetcher, config: AppConfig) -> (TempDir, CacheController) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResourceStore::open(dir.path().join("cache")).await.unwrap());
        let interceptor = Arc::new(RequestInterceptor::from_config(store.clone(), &config).unwrap());
        let pipeline = FetchPipeline::from_config(store.clone(), Arc::new(fetcher), Arc::new(NoLookup), &config);
        (dir, CacheController::new(store, pipeline, interceptor))
    }

    fn enabled_for_example() -> AppConfig {
        AppConfig { intercept_enabled: true, intercepted_domains: vec!["example.com".into()], ..Default::default() }
    }

    #[tokio::test]
    async fn test_example_page_end_to_end() {
        let (_dir, controller) = controller_with(example_fetcher(), enabled_for_example()).await;

        let outcome = controller.fetch_and_cache("https://example.com/").await.unwrap();
        assert_eq!(outcome.resources.len(), 2);
        assert!(outcome.failed.is_empty());

        let status = controller.status();
        assert_eq!(status.entries.len(), 1);
        assert_eq!(status.entries[0].url, "https://example.com/");
        assert!(status.entries[0].fresh);

        let entry_dir = outcome.document_path.parent().unwrap();
        assert_eq!(std::fs::read_dir(entry_dir).unwrap().count(), 3);

        assert!(
            controller
                .check_request("https://example.com/", ResourceType::MainFrame)
                .is_redirect()
        );
        assert_eq!(
            controller.check_request("https://example.com/other.html", ResourceType::MainFrame),
            InterceptDecision::Proceed
        );
    }

    #[tokio::test]
    async fn test_root_failure_surfaces_error() {
        let (_dir, controller) = controller_with(StaticFetcher::default(), AppConfig::default()).await;
        let mut events = controller.subscribe();

        let err = controller.fetch_and_cache("https://down.example/").await.unwrap_err();

        assert!(err.is_fetch());
        assert!(controller.status().entries.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partial_failure_reported() {
        let fetcher = StaticFetcher::default()
            .with("https://example.com/", EXAMPLE_HTML)
            .with("https://example.com/style.css", "body{}");
        let (_dir, controller) = controller_with(fetcher, AppConfig::default()).await;

        let outcome = controller.fetch_and_cache("https://example.com/").await.unwrap();

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(controller.status().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_refetch_keeps_one_entry() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;

        let first = controller.fetch_and_cache("https://example.com/").await.unwrap();
        let second = controller.fetch_and_cache("https://example.com/").await.unwrap();

        let status = controller.status();
        assert_eq!(status.entries.len(), 1);
        assert_eq!(status.entries[0].cached_at, second.cached_at);
        assert!(second.cached_at >= first.cached_at);
    }

    #[tokio::test]
    async fn test_padded_url_shares_entry() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;

        let padded = controller.fetch_and_cache("  https://example.com/\n").await.unwrap();
        let bare = controller.fetch_and_cache("https://example.com/").await.unwrap();

        assert_eq!(padded.url, "https://example.com/");
        assert_eq!(padded.document_path, bare.document_path);
        let status = controller.status();
        assert_eq!(status.entries.len(), 1);
        assert_eq!(status.entries[0].url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (_dir, controller) = controller_with(example_fetcher(), enabled_for_example()).await;
        let outcome = controller.fetch_and_cache("https://example.com/").await.unwrap();

        controller.clear_cache().await.unwrap();

        let status = controller.status();
        assert!(status.entries.is_empty());
        assert!(status.root.is_dir());
        assert!(!outcome.document_path.exists());
        assert_eq!(
            controller.check_request("https://example.com/", ResourceType::MainFrame),
            InterceptDecision::Proceed
        );
    }

    #[tokio::test]
    async fn test_toggle_interception() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;
        controller.fetch_and_cache("https://example.com/").await.unwrap();

        let status = controller.status();
        assert!(!status.interception.enabled);
        assert!(status.entries[0].fresh);
        assert_eq!(
            controller.check_request("https://example.com/", ResourceType::MainFrame),
            InterceptDecision::Proceed
        );

        assert!(controller.toggle_interception(true).enabled);
        assert!(
            controller
                .check_request("https://example.com/", ResourceType::MainFrame)
                .is_redirect()
        );

        assert!(!controller.toggle_interception(false).enabled);
        assert_eq!(
            controller.check_request("https://example.com/", ResourceType::MainFrame),
            InterceptDecision::Proceed
        );
    }

    #[tokio::test]
    async fn test_set_domains() {
        let (_dir, controller) = controller_with(StaticFetcher::default(), AppConfig::default()).await;

        let state = controller.set_domains(&["Example.com".into(), "cdn.example.net".into()], &[], false);
        assert_eq!(state.intercepted_domains.len(), 2);
        assert!(state.intercepted_domains.contains("example.com"));

        let state = controller.set_domains(&[], &["example.com".into()], false);
        assert_eq!(state.intercepted_domains.len(), 1);

        let state = controller.set_domains(&["other.org".into()], &[], true);
        assert_eq!(state.intercepted_domains.iter().collect::<Vec<_>>(), vec!["other.org"]);
    }

    #[tokio::test]
    async fn test_remove_and_purge() {
        let fetcher = example_fetcher().with("https://example.com/b", "<p>b</p>");
        let (_dir, controller) = controller_with(fetcher, AppConfig::default()).await;
        controller.fetch_and_cache("https://example.com/").await.unwrap();
        controller.fetch_and_cache("https://example.com/b").await.unwrap();

        assert!(controller.remove_entry("https://example.com/b").await.unwrap());
        assert!(!controller.remove_entry("https://example.com/b").await.unwrap());

        assert!(controller.purge_expired(None).await.unwrap().is_empty());
        let purged = controller.purge_expired(Some(Duration::ZERO)).await.unwrap();
        assert_eq!(purged, vec!["https://example.com/".to_string()]);
        assert!(controller.status().entries.is_empty());
    }

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let (_dir, controller) = controller_with(example_fetcher(), AppConfig::default()).await;
        let mut events = controller.subscribe();

        controller.fetch_and_cache(" https://example.com/ ").await.unwrap();
        controller.remove_entry("https://example.com/").await.unwrap();
        controller.clear_cache().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), CacheEvent::Updated { url: "https://example.com/".into() });
        assert_eq!(events.recv().await.unwrap(), CacheEvent::Removed { url: "https://example.com/".into() });
        assert_eq!(events.recv().await.unwrap(), CacheEvent::Cleared);
    }
}
