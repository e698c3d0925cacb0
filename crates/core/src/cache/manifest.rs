//! The manifest: persisted index from cached URL to entry metadata.
//!
//! On disk it is a single JSON object, `url -> {storageKey, cachedAt, lastValidatedAt}`,
//! written with a temp-file-and-rename so a crash never leaves a torn file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::hash::storage_key;
use crate::Error;

/// File name of the manifest beneath the cache root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata for one cached top-level URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The cached URL. Stored as the manifest key, not inside the value.
    #[serde(skip)]
    pub url: String,
    /// Directory name holding this entry's files.
    pub storage_key: String,
    pub cached_at: DateTime<Utc>,
    pub last_validated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry relative to `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.cached_at
    }

    /// True if the entry is younger than `max_age` at `now`.
    pub fn is_fresh_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        self.age_at(now) < max_age
    }
}

/// In-memory manifest, keyed by exact URL string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, CacheEntry>,
}

impl Manifest {
    /// Load the manifest at `path`.
    ///
    /// A missing file yields an empty manifest. An unreadable or corrupt file is
    /// logged and also yields an empty manifest; loading never fails.
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no manifest on disk, starting empty");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read manifest, starting empty");
                return Self::default();
            }
        };

        match Self::from_json(&raw) {
            Ok(manifest) => {
                tracing::debug!(path = %path.display(), entries = manifest.len(), "loaded manifest");
                manifest
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt manifest, starting empty");
                Self::default()
            }
        }
    }

    /// Decode a manifest from its JSON form.
    ///
    /// Entries whose storage key is not the hash of their URL are dropped, so
    /// a tampered file can never point an entry outside the cache root.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let mut manifest: Self = serde_json::from_str(raw).map_err(|e| Error::Manifest(e.to_string()))?;
        manifest.entries.retain(|url, entry| {
            if entry.storage_key != storage_key(url) {
                tracing::warn!(url = %url, storage_key = %entry.storage_key, "dropping manifest entry with foreign storage key");
                return false;
            }
            entry.url.clone_from(url);
            true
        });
        Ok(manifest)
    }

    /// Encode the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Manifest(e.to_string()))
    }

    pub fn get(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Insert or replace the entry for `entry.url`.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(entry.url.clone(), entry)
    }

    pub fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        self.entries.remove(url)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }
}

/// Write `json` to `path` atomically (temp file in the same directory, then rename).
pub async fn persist_json(path: &Path, json: &str) -> Result<(), Error> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| Error::storage("write manifest", &tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::storage("replace manifest", path, e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
