//! Client code for stash.
//!
//! This crate provides the HTTP fetch layer, sub-resource discovery and the
//! fetch-and-cache pipeline that fills the store in `stash-core`.

pub mod discover;
pub mod extension;
pub mod fetch;
pub mod pipeline;

pub use discover::{ResourceKind, SubResource, discover_resources};
pub use extension::{ContentTypeLookup, NoLookup, resolve_extension};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher};
pub use pipeline::{CacheOutcome, FetchPipeline};
