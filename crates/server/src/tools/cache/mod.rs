//! Store inspection tools.
//!
//! This module provides read-only views of the persistent response stores.

pub mod get;
pub mod stores;

pub use get::{CacheGetParams, cache_get_impl};
pub use stores::cache_stores_impl;
