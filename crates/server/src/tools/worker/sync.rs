//! worker_sync tool implementation.

use crate::tools::json_result;
use medref_client::{Event, EventOutcome, Worker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the worker_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncParams {
    /// Sync tag to deliver (default: the configured tag).
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output structure for the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncOutput {
    pub tag: String,
    /// False when the tag was not the worker's sync tag.
    pub ran: bool,
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

/// Deliver a sync event to the worker.
pub async fn sync_impl(worker: &Worker, params: WorkerSyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| worker.config().sync_tag.clone());

    let output = match worker.handle(Event::Sync { tag: tag.clone() }).await? {
        EventOutcome::Synced(report) => {
            WorkerSyncOutput { tag, ran: true, refreshed: report.refreshed, failed: report.failed }
        }
        _ => WorkerSyncOutput { tag, ran: false, refreshed: Vec::new(), failed: Vec::new() },
    };

    Ok(json_result(&output)?)
}
