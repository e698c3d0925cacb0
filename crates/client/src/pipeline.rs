//! Fetch-and-cache pipeline.
//!
//! One run fetches the root document, discovers its sub-resources, downloads
//! them with bounded concurrency and commits everything to the store as a
//! single entry. A root failure leaves the store untouched; sub-resource
//! failures are reported in the outcome without failing the run.
//!
//! Runs for the same URL are queued behind a per-URL lock so the last one to
//! finish wins with a complete entry.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use url::Url;

use stash_core::cache::{CachedResource, ResourceFailure, ResourcePayload};
use stash_core::{AppConfig, Error, ResourceStore};

use crate::discover::{SubResource, discover_resources};
use crate::extension::{ContentTypeLookup, resolve_extension};
use crate::fetch::{DOCUMENT_ACCEPT, Fetcher, RESOURCE_ACCEPT, parse_page_url};

/// Default number of sub-resources downloaded at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheOutcome {
    /// The URL exactly as submitted; this is the cache key.
    pub url: String,
    /// URL the root document was served from after redirects.
    pub final_url: String,
    pub storage_key: String,
    pub cached_at: DateTime<Utc>,
    pub document_path: PathBuf,
    pub resources: Vec<CachedResource>,
    /// Sub-resources that could not be fetched or written.
    pub failed: Vec<ResourceFailure>,
}

impl CacheOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Runs page captures against a [`ResourceStore`].
pub struct FetchPipeline {
    store: Arc<ResourceStore>,
    fetcher: Arc<dyn Fetcher>,
    lookup: Arc<dyn ContentTypeLookup>,
    max_concurrency: usize,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FetchPipeline {
    pub fn new(
        store: Arc<ResourceStore>, fetcher: Arc<dyn Fetcher>, lookup: Arc<dyn ContentTypeLookup>, max_concurrency: usize,
    ) -> Self {
        Self { store, fetcher, lookup, max_concurrency: max_concurrency.max(1), in_flight: Mutex::new(HashMap::new()) }
    }

    /// Build a pipeline whose concurrency comes from `config`.
    pub fn from_config(
        store: Arc<ResourceStore>, fetcher: Arc<dyn Fetcher>, lookup: Arc<dyn ContentTypeLookup>, config: &AppConfig,
    ) -> Self {
        Self::new(store, fetcher, lookup, config.max_concurrency)
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Fetch `url` and everything it references, then cache it under `url`.
    pub async fn run(&self, url: &str) -> Result<CacheOutcome, Error> {
        let root = parse_page_url(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let lock = self.lock_for(url).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(url, &root).await
        };
        self.release(url, lock).await;

        result
    }

    async fn run_locked(&self, url: &str, root: &Url) -> Result<CacheOutcome, Error> {
        let response = self.fetcher.fetch(root, DOCUMENT_ACCEPT).await.inspect_err(|e| {
            tracing::warn!(url, error = %e, "root document fetch failed");
        })?;

        let html = String::from_utf8_lossy(&response.bytes);
        let discovered = discover_resources(&html, &response.final_url);

        let (payloads, mut failed) = self.fetch_resources(discovered).await;
        let report = self.store.put(url, &response.bytes, payloads).await?;
        failed.extend(report.failed);

        if !failed.is_empty() {
            tracing::info!(url, failed = failed.len(), "cached with missing sub-resources");
        }

        Ok(CacheOutcome {
            url: url.to_string(),
            final_url: response.final_url.to_string(),
            storage_key: report.entry.storage_key,
            cached_at: report.entry.cached_at,
            document_path: report.document_path,
            resources: report.stored,
            failed,
        })
    }

    async fn fetch_resources(&self, resources: Vec<SubResource>) -> (Vec<ResourcePayload>, Vec<ResourceFailure>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for resource in resources {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let lookup = self.lookup.clone();

            join_set.spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => fetch_resource(fetcher.as_ref(), lookup.as_ref(), &resource.url).await,
                    Err(e) => Err(Error::HttpError(e.to_string())),
                };
                (resource.url, result)
            });
        }

        let mut payloads = Vec::new();
        let mut failed = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(payload))) => payloads.push(payload),
                Ok((url, Err(e))) => {
                    tracing::warn!(url = %url, error = %e, "sub-resource fetch failed");
                    failed.push(ResourceFailure { url: url.to_string(), reason: e.to_string() });
                }
                Err(e) => tracing::error!(error = %e, "sub-resource task aborted"),
            }
        }

        (payloads, failed)
    }

    async fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        self.in_flight.lock().await.entry(url.to_string()).or_default().clone()
    }

    async fn release(&self, url: &str, lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // One reference in the map plus ours: nobody else is queued.
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(url);
        }
    }
}

async fn fetch_resource(
    fetcher: &dyn Fetcher, lookup: &dyn ContentTypeLookup, url: &Url,
) -> Result<ResourcePayload, Error> {
    let response = fetcher.fetch(url, RESOURCE_ACCEPT).await?;
    let extension = resolve_extension(url, response.content_type.as_deref(), lookup).await;

    Ok(ResourcePayload { original_url: url.to_string(), bytes: response.bytes, extension })
}
