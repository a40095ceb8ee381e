//! MCP tool implementations.
//!
//! This module contains all tools exposed by the medref-worker server.

pub mod cache;
pub mod medications;
pub mod worker;

pub use cache::{CacheGetParams, cache_get_impl, cache_stores_impl};
pub use medications::{MedicationsListParams, medications_list_impl};
pub use worker::{WorkerFetchParams, WorkerMessageParams, WorkerSyncParams, fetch_impl, message_impl, sync_impl};

use medref_core::Error;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json =
        serde_json::to_string_pretty(output).map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
