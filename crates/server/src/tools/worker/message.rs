//! worker_message tool implementation.

use crate::tools::json_result;
use medref_client::{Event, EventOutcome, Message, Worker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message payload, e.g. {"type": "CLEAN_CACHE"}.
    pub message: serde_json::Value,
}

/// Output structure for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// False when the worker ignored the message.
    pub handled: bool,
    /// Runtime entries removed by a cleanup.
    pub removed: Option<u64>,
}

/// Post a message to the worker.
pub async fn message_impl(worker: &Worker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message = Message::from_value(params.message);

    let output = match worker.handle(Event::Message(message)).await? {
        EventOutcome::Cleaned { removed } => WorkerMessageOutput { handled: true, removed: Some(removed) },
        _ => WorkerMessageOutput { handled: false, removed: None },
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output, worker};
    use chrono::{Duration, Utc};
    use medref_core::CachedResponse;
    use serde_json::json;

    #[tokio::test]
    async fn test_clean_cache_message() {
        let worker = worker(true).await;
        let stale = (Utc::now() - Duration::hours(48)).format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let response = CachedResponse { status: 200, headers: vec![("date".into(), stale)], body: Vec::new() };
        let runtime = worker.db().store(&worker.config().runtime_store);
        runtime.put("GET", "https://cdn.example.com/a.css", &response).await.unwrap();

        let result = message_impl(&worker, WorkerMessageParams { message: json!({"type": "CLEAN_CACHE"}) })
            .await
            .unwrap();
        let out = output(&result);

        assert_eq!(out["handled"], true);
        assert_eq!(out["removed"], 1);
        assert!(runtime.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let worker = worker(true).await;

        for message in [json!({"type": "SKIP_WAITING"}), json!("CLEAN_CACHE"), json!({})] {
            let result = message_impl(&worker, WorkerMessageParams { message }).await.unwrap();
            let out = output(&result);
            assert_eq!(out["handled"], false);
            assert!(out["removed"].is_null());
        }
    }
}
