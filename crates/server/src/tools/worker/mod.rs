//! Tools that drive the worker: fetch events, messages and sync events.

pub mod fetch;
pub mod message;
pub mod sync;

pub use fetch::{WorkerFetchParams, fetch_impl};
pub use message::{WorkerMessageParams, message_impl};
pub use sync::{WorkerSyncParams, sync_impl};
