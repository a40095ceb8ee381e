//! Core types and shared functionality for the medref offline cache.
//!
//! This crate provides:
//! - Named response stores with a SQLite backend
//! - The in-memory application cache used by the data-access layer
//! - Unified error types
//! - Configuration structures

pub mod app_cache;
pub mod config;
pub mod error;
pub mod store;

pub use app_cache::AppCache;
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{CacheDb, CachedResponse, Store, StoreEntry, StoreSummary};
