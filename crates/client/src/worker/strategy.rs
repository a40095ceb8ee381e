//! The three fetch strategies.
//!
//! Each strategy owns one lane. Store failures never surface to the caller:
//! a failed read counts as a miss and a failed write is logged.

use crate::fetch::{Fetcher, Request, Response};
use medref_core::{CacheDb, Error, Store};
use reqwest::{StatusCode, Url};

/// Body text of the synthesized offline response.
pub const OFFLINE_MESSAGE: &str =
    "Medical data is not available offline. Connect to the network to load it for the first time.";

/// 503 returned when medical data is in neither the network nor the store.
pub fn offline_response() -> Response {
    Response::json(
        StatusCode::SERVICE_UNAVAILABLE,
        &serde_json::json!({ "error": "Offline", "message": OFFLINE_MESSAGE }),
    )
}

async fn lookup(store: &Store, url: &Url) -> Option<Response> {
    match store.get("GET", url.as_str()).await {
        Ok(Some(cached)) => match Response::from_cached(cached) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(store = store.name(), url = %url, error = %e, "discarding undecodable entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(store = store.name(), url = %url, error = %e, "store read failed");
            None
        }
    }
}

async fn persist(store: &Store, url: &Url, response: &Response) {
    if let Err(e) = store.put("GET", url.as_str(), &response.to_cached()).await {
        tracing::warn!(store = store.name(), url = %url, error = %e, "store write failed");
    }
}

/// Medical-data lane: network first, store fallback, synthesized 503 last.
///
/// A non-2xx response is treated like a transport failure. Always yields a
/// response.
pub async fn network_first(fetcher: &dyn Fetcher, store: &Store, request: &Request) -> Response {
    let failure = match fetcher.fetch(request).await {
        Ok(response) if response.is_success() => {
            persist(store, &request.url, &response).await;
            return response;
        }
        Ok(response) => Error::HttpError(format!("status {}", response.status.as_u16())),
        Err(e) => e,
    };

    tracing::debug!(url = %request.url, error = %failure, "network failed for medical data, trying store");

    match lookup(store, &request.url).await {
        Some(cached) => {
            tracing::info!(url = %request.url, "serving medical data from store");
            cached
        }
        None => {
            tracing::warn!(url = %request.url, "medical data unavailable offline");
            offline_response()
        }
    }
}

/// Same-origin lane: any store first, network on miss, refill into `store`.
///
/// A hit never touches the network. Navigation requests that fail fall back to
/// the cached root document.
pub async fn cache_first(
    fetcher: &dyn Fetcher, db: &CacheDb, store: &Store, root: &Url, request: &Request,
) -> Result<Response, Error> {
    match db.match_any("GET", request.url.as_str()).await {
        Ok(Some(cached)) => match Response::from_cached(cached) {
            Ok(response) => {
                tracing::debug!(url = %request.url, "cache hit");
                return Ok(response);
            }
            Err(e) => tracing::warn!(url = %request.url, error = %e, "discarding undecodable entry"),
        },
        Ok(None) => tracing::debug!(url = %request.url, "cache miss"),
        Err(e) => tracing::warn!(url = %request.url, error = %e, "store lookup failed"),
    }

    match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                persist(store, &request.url, &response).await;
            }
            Ok(response)
        }
        Err(e) if request.is_navigation() => {
            let shell = db
                .match_any("GET", root.as_str())
                .await
                .ok()
                .flatten()
                .and_then(|cached| Response::from_cached(cached).ok());
            match shell {
                Some(shell) => {
                    tracing::info!(url = %request.url, "navigation offline, serving app shell");
                    Ok(shell)
                }
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// External lane: network first, `store` fallback on transport failure.
///
/// Non-2xx responses are returned as-is and not stored.
pub async fn network_with_fallback(
    fetcher: &dyn Fetcher, store: &Store, request: &Request,
) -> Result<Response, Error> {
    match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                persist(store, &request.url, &response).await;
            }
            Ok(response)
        }
        Err(e) => match lookup(store, &request.url).await {
            Some(cached) => {
                tracing::debug!(url = %request.url, "serving external resource from store");
                Ok(cached)
            }
            None => Err(e),
        },
    }
}
