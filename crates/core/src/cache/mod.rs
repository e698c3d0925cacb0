//! Disk-backed page cache.
//!
//! This module provides the resource store used by both the fetch pipeline
//! and the request interceptor:
//!
//! - One directory per cached URL, named by the SHA-256 of the URL
//! - A JSON manifest recording when each entry was cached
//! - Atomic entry replacement and manifest writes

pub mod hash;
pub mod manifest;
pub mod store;

pub use crate::Error;

pub use manifest::{CacheEntry, Manifest};
pub use store::{CachedResource, DEFAULT_MAX_AGE, PutReport, ResourceFailure, ResourcePayload, ResourceStore};
