//! cache_stores tool implementation.

use crate::tools::json_result;
use medref_core::{CacheDb, StoreSummary};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_stores tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresOutput {
    pub stores: Vec<StoreSummary>,
}

/// List every store with its entry count and body size.
pub async fn cache_stores_impl(db: &CacheDb) -> Result<CallToolResult, McpError> {
    let stores = db.store_summaries().await?;
    Ok(json_result(&CacheStoresOutput { stores })?)
}
