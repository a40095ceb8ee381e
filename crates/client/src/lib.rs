//! Worker-side code for the medref offline cache.
//!
//! This crate provides the request/response model and network fetcher, the
//! worker (router, fetch strategies, lifecycle, background sync, janitor) and
//! the data-access layer that reads through it.

pub mod data;
pub mod fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use data::MedicationsApi;
pub use fetch::{FetchConfig, Fetcher, HttpFetcher, Request, RequestMode, Response};
pub use worker::{Event, EventOutcome, FetchOutcome, Lane, LifecycleState, Message, Worker, WorkerConfig};
