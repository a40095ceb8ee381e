//! cache_get tool implementation.
//!
//! Reads one stored response by store name and request URL. The URL is
//! canonicalized the same way requests are before they are stored.

use crate::tools::json_result;
use medref_client::fetch::canonicalize;
use medref_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Store name, e.g. "app-medical-data-v2".
    pub store: String,

    /// Request URL the entry was stored under.
    pub url: String,

    /// Request method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub store: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the cache_get tool.
pub async fn cache_get_impl(db: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if !db.has_store(&params.store).await? {
        return Err(Error::StoreUnavailable(format!("no store named '{}'", params.store)).into());
    }

    let url = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = params.method.to_ascii_uppercase();

    let response = db
        .store(&params.store)
        .get(&method, url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url}")))?;

    let output = CacheGetOutput {
        store: params.store,
        url: url.to_string(),
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        headers: response.headers,
    };

    Ok(json_result(&output)?)
}
