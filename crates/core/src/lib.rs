//! Core types and shared functionality for stash.
//!
//! This crate provides:
//! - The on-disk page cache and its manifest
//! - The synchronous request interceptor
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod intercept;

pub use cache::{CacheEntry, Manifest, ResourceStore};
pub use config::AppConfig;
pub use error::Error;
pub use intercept::{InterceptDecision, InterceptRequest, InterceptionState, RequestInterceptor, ResourceType};
