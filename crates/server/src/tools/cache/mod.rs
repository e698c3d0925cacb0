//! Cache tools.
//!
//! One module per tool; the handler forwards each call to the matching
//! `*_impl` function.

pub mod check;
pub mod clear;
pub mod domains;
pub mod fetch;
pub mod purge;
pub mod remove;
pub mod status;
pub mod toggle;

pub use check::{CacheCheckParams, check_impl};
pub use clear::clear_impl;
pub use domains::{CacheDomainsParams, domains_impl};
pub use fetch::{CacheFetchParams, fetch_impl};
pub use purge::{CachePurgeParams, purge_impl};
pub use remove::{CacheRemoveParams, remove_impl};
pub use status::status_impl;
pub use toggle::{CacheToggleParams, toggle_impl};
