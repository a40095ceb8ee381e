//! worker_fetch tool implementation.
//!
//! Dispatches a GET as a fetch event and reports which lane answered it. A
//! request the worker passes through is performed against the network, the
//! way the host would.

use crate::tools::json_result;
use chrono::Utc;
use medref_client::{FetchOutcome, Lane, Request, Worker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL to request.
    pub url: String,

    /// Treat the request as a page navigation (default: false).
    #[serde(default)]
    pub navigate: bool,
}

/// Output structure for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    /// "medical_data", "same_origin", "external", or null on passthrough.
    pub lane: Option<String>,
    pub status: u16,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub fetched_at: String,
}

fn lane_name(lane: Lane) -> &'static str {
    match lane {
        Lane::MedicalData => "medical_data",
        Lane::SameOrigin => "same_origin",
        Lane::External => "external",
    }
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let request = if params.navigate { Request::navigate(&params.url)? } else { Request::get(&params.url)? };

    let (lane, response) = match worker.on_fetch(&request).await? {
        FetchOutcome::Respond { lane, response } => (Some(lane_name(lane).to_string()), response),
        FetchOutcome::Passthrough => (None, worker.passthrough(&request).await?),
    };

    let output = WorkerFetchOutput {
        url: request.url.to_string(),
        lane,
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        fetched_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output, worker};

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.into(), navigate: false }
    }

    #[tokio::test]
    async fn test_fetch_medical_data_offline() {
        let worker = worker(true).await;

        let result = fetch_impl(&worker, params("https://medref.supabase.co/rest/v1/medications?select=*"))
            .await
            .unwrap();
        let out = output(&result);

        assert_eq!(out["lane"], "medical_data");
        assert_eq!(out["status"], 503);
        assert_eq!(out["content_type"], "application/json");
        let body: serde_json::Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["error"], "Offline");
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let worker = worker(false).await;

        let err = fetch_impl(&worker, params("https://medref.supabase.co/rest/v1/medications?select=*"))
            .await
            .unwrap_err();

        assert_eq!(err.code.0, -32004);
    }

    #[tokio::test]
    async fn test_fetch_rejects_relative_url() {
        let worker = worker(true).await;

        let err = fetch_impl(&worker, params("/medications")).await.unwrap_err();

        assert_eq!(err.code.0, -32003);
    }
}
