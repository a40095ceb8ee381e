//! medications_list tool implementation.
//!
//! Reads rows through the data-access layer, so results come from the session
//! cache, the network, or the medical-data store, in that order.

use crate::tools::json_result;
use medref_client::MedicationsApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the medications_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MedicationsListParams {
    /// Table to read (default: "medications").
    #[serde(default = "default_table")]
    pub table: String,

    /// Return only the row with this id.
    #[serde(default)]
    pub id: Option<String>,
}

fn default_table() -> String {
    "medications".into()
}

/// Output structure for the medications_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MedicationsListOutput {
    pub table: String,
    pub count: usize,
    pub rows: Vec<serde_json::Value>,
}

/// Implementation of the medications_list tool.
pub async fn medications_list_impl(
    api: &MedicationsApi, params: MedicationsListParams,
) -> Result<CallToolResult, McpError> {
    let rows: Vec<serde_json::Value> = match &params.id {
        Some(id) => api.get(&params.table, id).await?.into_iter().collect(),
        None => api.list(&params.table).await?,
    };

    let output = MedicationsListOutput { table: params.table, count: rows.len(), rows };
    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output, worker};
    use medref_core::CachedResponse;
    use std::time::Duration;

    const BASE: &str = "https://medref.supabase.co";

    fn params(id: Option<&str>) -> MedicationsListParams {
        MedicationsListParams { table: default_table(), id: id.map(str::to_string) }
    }

    #[tokio::test]
    async fn test_list_served_from_medical_store_offline() {
        let worker = worker(true).await;
        let medical = worker.db().store(&worker.config().medical_store);
        let stored = CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: br#"[{"id":1,"name":"Adenosine"},{"id":2,"name":"Amiodarone"}]"#.to_vec(),
        };
        medical.put("GET", &format!("{BASE}/rest/v1/medications?select=*"), &stored).await.unwrap();
        let api = MedicationsApi::new(worker, BASE, None, Duration::from_secs(60)).unwrap();

        let out = output(&medications_list_impl(&api, params(None)).await.unwrap());

        assert_eq!(out["count"], 2);
        assert_eq!(out["rows"][1]["name"], "Amiodarone");
    }

    #[tokio::test]
    async fn test_list_offline_without_store_is_error() {
        let worker = worker(true).await;
        let api = MedicationsApi::new(worker, BASE, None, Duration::from_secs(60)).unwrap();

        let err = medications_list_impl(&api, params(Some("3"))).await.unwrap_err();

        assert_eq!(err.code.0, -32009);
    }
}
