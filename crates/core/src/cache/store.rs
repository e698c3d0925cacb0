//! On-disk resource store.
//!
//! Layout beneath the cache root:
//!
//! ```text
//! <root>/
//!   manifest.json
//!   <storage_key>/
//!     index.html
//!     <resource_hash>.<ext>
//! ```
//!
//! The manifest is the source of truth for what is cached. Entry directories
//! are written into a staging directory and swapped into place, so readers
//! only ever observe a complete entry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::hash::{resource_file_name, storage_key};
use super::manifest::{CacheEntry, MANIFEST_FILE, Manifest, persist_json};
use crate::Error;

/// File name of the primary document inside an entry directory.
pub const DOCUMENT_FILE: &str = "index.html";

/// Default freshness window (24 hours).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const STAGING_PREFIX: &str = ".staging-";
const TRASH_INFIX: &str = ".trash-";

/// A fetched sub-resource ready to be written.
#[derive(Debug, Clone)]
pub struct ResourcePayload {
    /// Absolute URL the bytes were fetched from.
    pub original_url: String,
    pub bytes: Bytes,
    /// Extension resolved from the URL path or content-type, without the dot.
    pub extension: Option<String>,
}

/// A sub-resource written under its entry directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CachedResource {
    pub original_url: String,
    pub stored_path: PathBuf,
}

/// A sub-resource that could not be fetched or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of a successful [`ResourceStore::put`].
#[derive(Debug, Clone)]
pub struct PutReport {
    pub entry: CacheEntry,
    pub document_path: PathBuf,
    pub stored: Vec<CachedResource>,
    /// Resources whose write failed; the entry was committed without them.
    pub failed: Vec<ResourceFailure>,
}

/// Durable URL-to-files cache with a JSON manifest.
///
/// Reads take a short synchronous lock on the in-memory manifest and never
/// await, so they are safe to call from the interception path. Mutations
/// (`put`, `remove`, `purge_expired`, `clear`) are serialized by a writer lock
/// that covers the directory swap and the manifest persist.
#[derive(Debug)]
pub struct ResourceStore {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: RwLock<Manifest>,
    writer: Mutex<()>,
    seq: AtomicU64,
}

impl ResourceStore {
    /// Create a store rooted at `root` without touching the disk.
    ///
    /// Call [`initialize`](Self::initialize) before use, or use [`open`](Self::open).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let manifest_path = root.join(MANIFEST_FILE);
        Self {
            root,
            manifest_path,
            manifest: RwLock::new(Manifest::default()),
            writer: Mutex::new(()),
            seq: AtomicU64::new(0),
        }
    }

    /// Create and initialize a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let store = Self::new(root);
        store.initialize().await?;
        Ok(store)
    }

    /// Ensure the cache root exists and load the manifest.
    ///
    /// A missing or corrupt manifest is logged and replaced by an empty one;
    /// only a failure to create the root directory is returned. Leftover
    /// staging directories from an interrupted write, and old roots left beside
    /// this one by an interrupted clear, are removed.
    pub async fn initialize(&self) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::storage("create cache root", &self.root, e))?;

        self.remove_stale_staging().await;
        self.remove_stale_trash().await;

        let manifest = Manifest::load(&self.manifest_path).await;
        tracing::info!(root = %self.root.display(), entries = manifest.len(), "cache store initialized");
        *self.manifest.write() = manifest;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if `url` has a manifest entry.
    pub fn is_cached(&self, url: &str) -> bool {
        self.manifest.read().contains(url)
    }

    /// True if `url` is cached and younger than `max_age`.
    pub fn is_valid(&self, url: &str, max_age: Duration) -> bool {
        self.is_valid_at(url, max_age, Utc::now())
    }

    /// [`is_valid`](Self::is_valid) evaluated at an explicit instant.
    pub fn is_valid_at(&self, url: &str, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.manifest
            .read()
            .get(url)
            .is_some_and(|entry| entry.is_fresh_at(max_age, now))
    }

    /// Metadata for `url`, if cached.
    pub fn entry(&self, url: &str) -> Option<CacheEntry> {
        self.manifest.read().get(url).cloned()
    }

    /// Path of the cached document for `url`, regardless of freshness.
    ///
    /// Returns `None` when there is no manifest entry, and also when the entry
    /// exists but its document is missing from disk.
    pub fn primary_path(&self, url: &str) -> Option<PathBuf> {
        let key = self.manifest.read().get(url)?.storage_key.clone();
        let path = self.entry_dir(&key).join(DOCUMENT_FILE);
        if path.is_file() {
            Some(path)
        } else {
            tracing::warn!(url, path = %path.display(), "manifest entry has no document on disk");
            None
        }
    }

    /// Copy of the current manifest.
    pub fn snapshot(&self) -> Manifest {
        self.manifest.read().clone()
    }

    /// Store `document` and `resources` as the entry for `url`.
    ///
    /// Replaces any previous entry for the same URL. A failure to write the
    /// document aborts with no change; a failure to write one resource is
    /// recorded in the report and the rest of the entry is still committed.
    /// A manifest persist failure is logged, not returned.
    pub async fn put(&self, url: &str, document: &[u8], resources: Vec<ResourcePayload>) -> Result<PutReport, Error> {
        let key = storage_key(url);
        let staging = self
            .root
            .join(format!("{STAGING_PREFIX}{key}-{}", self.seq.fetch_add(1, Ordering::Relaxed)));

        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| Error::storage("create staging directory", &staging, e))?;

        if let Err(e) = tokio::fs::write(staging.join(DOCUMENT_FILE), document).await {
            discard(&staging).await;
            return Err(Error::storage("write document", staging.join(DOCUMENT_FILE), e));
        }

        let target = self.entry_dir(&key);
        let mut staged = Vec::with_capacity(resources.len());
        let mut failed = Vec::new();

        for resource in resources {
            let name = resource_file_name(&resource.original_url, resource.extension.as_deref());
            match tokio::fs::write(staging.join(&name), &resource.bytes).await {
                Ok(()) => {
                    staged.push(CachedResource { original_url: resource.original_url, stored_path: target.join(name) })
                }
                Err(e) => {
                    tracing::warn!(url = %resource.original_url, error = %e, "failed to write resource");
                    failed.push(ResourceFailure { url: resource.original_url, reason: e.to_string() });
                }
            }
        }

        let _writer = self.writer.lock().await;

        if let Err(e) = remove_dir_if_exists(&target).await {
            discard(&staging).await;
            return Err(Error::storage("replace entry directory", &target, e));
        }

        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            discard(&staging).await;
            // The previous entry directory is already gone.
            let dropped = self.manifest.write().remove(url).is_some();
            if dropped {
                self.persist().await;
            }
            return Err(Error::storage("commit entry directory", &target, e));
        }

        let now = Utc::now();
        let entry = CacheEntry { url: url.to_string(), storage_key: key, cached_at: now, last_validated_at: now };
        self.manifest.write().insert(entry.clone());
        self.persist().await;

        tracing::info!(url, resources = staged.len(), failed = failed.len(), "cached entry");

        Ok(PutReport { entry, document_path: target.join(DOCUMENT_FILE), stored: staged, failed })
    }

    /// Delete the entry for `url`. Returns `false` if it was not cached.
    pub async fn remove(&self, url: &str) -> Result<bool, Error> {
        let _writer = self.writer.lock().await;

        let Some(key) = self.manifest.read().get(url).map(|e| e.storage_key.clone()) else {
            return Ok(false);
        };

        let dir = self.entry_dir(&key);
        remove_dir_if_exists(&dir)
            .await
            .map_err(|e| Error::storage("remove entry directory", &dir, e))?;

        self.manifest.write().remove(url);
        self.persist().await;

        tracing::info!(url, "removed cached entry");
        Ok(true)
    }

    /// Delete every entry older than `max_age` and return their URLs.
    ///
    /// Entries whose directory cannot be deleted are kept and logged.
    pub async fn purge_expired(&self, max_age: Duration) -> Result<Vec<String>, Error> {
        let _writer = self.writer.lock().await;

        let now = Utc::now();
        let expired: Vec<CacheEntry> = self
            .manifest
            .read()
            .entries()
            .filter(|entry| !entry.is_fresh_at(max_age, now))
            .cloned()
            .collect();

        let mut purged = Vec::with_capacity(expired.len());
        for entry in expired {
            let dir = self.entry_dir(&entry.storage_key);
            match remove_dir_if_exists(&dir).await {
                Ok(()) => {
                    self.manifest.write().remove(&entry.url);
                    purged.push(entry.url);
                }
                Err(e) => tracing::warn!(url = %entry.url, error = %e, "failed to purge expired entry"),
            }
        }

        if !purged.is_empty() {
            self.persist().await;
            tracing::info!(count = purged.len(), "purged expired entries");
        }
        Ok(purged)
    }

    /// Delete the whole cache and start over with an empty manifest.
    ///
    /// The root is first renamed aside; if that fails nothing has changed and
    /// the error is returned. If the fresh root cannot be created the old one
    /// is moved back before returning the error.
    pub async fn clear(&self) -> Result<(), Error> {
        let _writer = self.writer.lock().await;

        let trash = self.trash_path();
        let had_root = match tokio::fs::rename(&self.root, &trash).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::storage("move cache root aside", &self.root, e)),
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            if had_root && let Err(restore) = tokio::fs::rename(&trash, &self.root).await {
                tracing::error!(
                    root = %self.root.display(),
                    trash = %trash.display(),
                    error = %restore,
                    "failed to restore cache root; cache may be inconsistent"
                );
            }
            return Err(Error::storage("recreate cache root", &self.root, e));
        }

        self.manifest.write().clear();
        self.persist().await;

        if had_root && let Err(e) = tokio::fs::remove_dir_all(&trash).await {
            tracing::warn!(path = %trash.display(), error = %e, "failed to delete old cache contents");
        }

        tracing::info!(root = %self.root.display(), "cache cleared");
        Ok(())
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn trash_prefix(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        format!("{name}{TRASH_INFIX}")
    }

    fn trash_path(&self) -> PathBuf {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .with_file_name(format!("{}{}-{seq}", self.trash_prefix(), std::process::id()))
    }

    /// Write the in-memory manifest to disk, logging on failure.
    async fn persist(&self) {
        let json = self.manifest.read().to_json();
        let result = match json {
            Ok(json) => persist_json(&self.manifest_path, &json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist manifest; on-disk manifest is behind");
        }
    }

    /// Delete old roots left beside this one by a `clear` that never finished.
    async fn remove_stale_trash(&self) {
        let Some(parent) = self.root.parent() else {
            return;
        };
        let Ok(mut dir) = tokio::fs::read_dir(parent).await else {
            return;
        };
        let prefix = self.trash_prefix();
        while let Ok(Some(item)) = dir.next_entry().await {
            if item.file_name().to_string_lossy().starts_with(&prefix) {
                tracing::debug!(path = %item.path().display(), "removing stale cache trash");
                discard(&item.path()).await;
            }
        }
    }

    async fn remove_stale_staging(&self) {
        let Ok(mut dir) = tokio::fs::read_dir(&self.root).await else {
            return;
        };
        while let Ok(Some(item)) = dir.next_entry().await {
            if item.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                tracing::debug!(path = %item.path().display(), "removing stale staging directory");
                discard(&item.path()).await;
            }
        }
    }
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn discard(path: &Path) {
    if let Err(e) = remove_dir_if_exists(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove leftover directory");
    }
}
