//! Background refresh of medical-data endpoints.
//!
//! One pass fetches every endpoint concurrently. Endpoints are isolated: a
//! failure is logged and counted, never propagated. There are no retries
//! within a pass; the next sync event is the retry.

use crate::fetch::{Fetcher, Request};
use futures_util::future::join_all;
use medref_core::{Error, Store};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

/// Endpoints and auth headers for a sync pass.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub endpoints: Vec<Url>,
    pub headers: HeaderMap,
}

impl SyncPlan {
    /// Build the plan, attaching `apikey` and bearer headers when a key is set.
    pub fn new(endpoints: Vec<Url>, api_key: Option<&str>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let apikey = HeaderValue::from_str(key).map_err(|e| Error::InvalidInput(format!("sync_api_key: {e}")))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| Error::InvalidInput(format!("sync_api_key: {e}")))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }
        Ok(Self { endpoints, headers })
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

async fn refresh(fetcher: &dyn Fetcher, store: &Store, url: &Url, headers: &HeaderMap) -> Result<(), Error> {
    let request = Request::get(url.as_str())?.with_headers(headers);
    let response = fetcher.fetch(&request).await?;
    if !response.is_success() {
        return Err(Error::HttpError(format!("status {}", response.status.as_u16())));
    }
    store.put("GET", request.url.as_str(), &response.to_cached()).await
}

/// Run one sync pass into `store`.
pub async fn run(fetcher: &dyn Fetcher, store: &Store, plan: &SyncPlan) -> SyncReport {
    let outcomes = join_all(plan.endpoints.iter().map(|url| async move {
        let outcome = refresh(fetcher, store, url, &plan.headers).await;
        (url, outcome)
    }))
    .await;

    let mut report = SyncReport::default();
    for (url, outcome) in outcomes {
        match outcome {
            Ok(()) => report.refreshed.push(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "background sync failed for endpoint");
                report.failed.push(url.to_string());
            }
        }
    }

    tracing::info!(refreshed = report.refreshed.len(), failed = report.failed.len(), "sync pass complete");
    report
}
