//! SQLite-backed named response stores.
//!
//! A store is a persistent mapping from a request identity to the most
//! recently written response. Several independently named stores share one
//! database file:
//!
//! - Create-if-absent open, enumeration and whole-store deletion
//! - Per-key UPSERT writes (last write wins)
//! - Lookup within one store or across all of them
//! - Automatic schema migrations, WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CachedResponse, Store, StoreEntry, StoreSummary};
pub use key::request_key;
