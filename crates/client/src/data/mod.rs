//! Data-access layer over the remote store's REST interface.
//!
//! Reads go through the worker (and so through the medical-data lane) and are
//! memoized in an [`AppCache`] for the session. Every mutation drops the
//! table's cached keys before returning, whatever its outcome.

use crate::fetch::{Request, Response};
use crate::worker::Worker;
use medref_core::{AppCache, Error};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Page-side client for the medication tables.
pub struct MedicationsApi {
    worker: Arc<Worker>,
    base: Url,
    headers: HeaderMap,
    cache: AppCache<Value>,
    ttl: Duration,
}

fn check_table(table: &str) -> Result<(), Error> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidInput(format!("invalid table name: '{table}'")));
    }
    Ok(())
}

fn list_key(table: &str) -> String {
    format!("{table}:list")
}

fn row_key(table: &str, id: &str) -> String {
    format!("{table}:row:{id}")
}

fn id_filter(id: &str) -> String {
    format!("eq.{id}")
}

impl MedicationsApi {
    /// Create a client for the data store at `base` (e.g. `https://x.supabase.co`).
    pub fn new(worker: Arc<Worker>, base: &str, api_key: Option<&str>, ttl: Duration) -> Result<Self, Error> {
        let base = crate::fetch::canonicalize(base).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let invalid = |e: reqwest::header::InvalidHeaderValue| Error::InvalidInput(format!("api key: {e}"));
            headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?);
        }

        Ok(Self { worker, base, headers, cache: AppCache::new(), ttl })
    }

    /// The session cache, shared with any clone of it.
    pub fn cache(&self) -> &AppCache<Value> {
        &self.cache
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<String, Error> {
        check_table(table)?;
        let mut url = self
            .base
            .join(&format!("/rest/v1/{table}"))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.to_string())
    }

    async fn send(&self, request: Request) -> Result<Response, Error> {
        let request = request.with_headers(&self.headers);
        let response = self.worker.respond(&request).await?;
        if response.is_success() {
            return Ok(response);
        }

        if response.status == StatusCode::SERVICE_UNAVAILABLE
            && let Ok(body) = response.parse_json::<Value>()
            && body["error"] == "Offline"
        {
            let message = body["message"].as_str().unwrap_or("offline").to_string();
            return Err(Error::Offline(message));
        }

        Err(Error::HttpError(format!("status {} for {}", response.status.as_u16(), request.url)))
    }

    async fn fetch_rows(&self, url: &str) -> Result<Vec<Value>, Error> {
        let response = self.send(Request::get(url)?).await?;
        response.parse_json()
    }

    /// Every row of `table`.
    pub async fn list(&self, table: &str) -> Result<Vec<Value>, Error> {
        let key = list_key(table);
        if let Some(Value::Array(rows)) = self.cache.get(&key).await {
            tracing::debug!(key = %key, "app cache hit");
            return Ok(rows);
        }

        let rows = self.fetch_rows(&self.table_url(table, &[("select", "*")])?).await?;
        self.cache.set(key, Value::Array(rows.clone()), self.ttl).await;
        Ok(rows)
    }

    /// One row of `table` by id.
    pub async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, Error> {
        let key = row_key(table, id);
        if let Some(row) = self.cache.get(&key).await {
            tracing::debug!(key = %key, "app cache hit");
            return Ok(Some(row));
        }

        let filter = id_filter(id);
        let url = self.table_url(table, &[("select", "*"), ("id", filter.as_str())])?;
        let row = self.fetch_rows(&url).await?.into_iter().next();
        if let Some(row) = &row {
            self.cache.set(key, row.clone(), self.ttl).await;
        }
        Ok(row)
    }

    /// Insert a row and return what the store wrote.
    pub async fn insert(&self, table: &str, row: &Value) -> Result<Vec<Value>, Error> {
        let url = self.table_url(table, &[("select", "*")])?;
        let request = Request::new(Method::POST, &url)?
            .with_header("prefer", "return=representation")?
            .with_header("content-type", "application/json")?
            .with_body(row.to_string());
        self.mutate(table, request).await
    }

    /// Patch the row with `id`.
    pub async fn update(&self, table: &str, id: &str, patch: &Value) -> Result<Vec<Value>, Error> {
        let filter = id_filter(id);
        let url = self.table_url(table, &[("id", filter.as_str())])?;
        let request = Request::new(Method::PATCH, &url)?
            .with_header("prefer", "return=representation")?
            .with_header("content-type", "application/json")?
            .with_body(patch.to_string());
        self.mutate(table, request).await
    }

    /// Delete the row with `id`.
    pub async fn delete(&self, table: &str, id: &str) -> Result<(), Error> {
        let filter = id_filter(id);
        let url = self.table_url(table, &[("id", filter.as_str())])?;
        self.mutate(table, Request::new(Method::DELETE, &url)?).await.map(|_| ())
    }

    async fn mutate(&self, table: &str, request: Request) -> Result<Vec<Value>, Error> {
        let outcome = self.send(request).await;
        self.cache.invalidate_pattern(&format!("{table}:")).await;

        let response = outcome?;
        if response.body.is_empty() {
            return Ok(Vec::new());
        }
        response.parse_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use crate::worker::{Event, WorkerConfig};
    use medref_core::{AppConfig, CacheDb};

    const BASE: &str = "https://medref.supabase.co";
    const LIST: &str = "https://medref.supabase.co/rest/v1/medications?select=*";
    const ROW: &str = "https://medref.supabase.co/rest/v1/medications?select=*&id=eq.7";
    const ROW_NAMED_LIST: &str = "https://medref.supabase.co/rest/v1/medications?select=*&id=eq.list";
    const BY_ID: &str = "https://medref.supabase.co/rest/v1/medications?id=eq.7";

    async fn api(fetcher: Arc<ScriptedFetcher>) -> MedicationsApi {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = WorkerConfig::from_app(&AppConfig { sync_endpoints: Vec::new(), ..Default::default() }).unwrap();
        let worker = Arc::new(Worker::new(db, fetcher, config));
        worker.handle(Event::Install).await.unwrap();
        worker.handle(Event::Activate).await.unwrap();
        MedicationsApi::new(worker, BASE, Some("anon"), Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn test_list_is_memoized() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(LIST, 200, r#"[{"id":7,"name":"Epinephrine"}]"#);
        let api = api(fetcher.clone()).await;

        let first = api.list("medications").await.unwrap();
        let second = api.list("medications").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0]["name"], "Epinephrine");
        assert_eq!(fetcher.calls_to(LIST), 1);
    }

    #[tokio::test]
    async fn test_get_row() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(ROW, 200, r#"[{"id":7,"name":"Epinephrine"}]"#);
        let api = api(fetcher.clone()).await;

        let row = api.get("medications", "7").await.unwrap().unwrap();
        assert_eq!(row["id"], 7);
        api.get("medications", "7").await.unwrap();
        assert_eq!(fetcher.calls_to(ROW), 1);
    }

    #[tokio::test]
    async fn test_get_missing_row_is_not_cached() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(ROW, 200, "[]");
        let api = api(fetcher.clone()).await;

        assert!(api.get("medications", "7").await.unwrap().is_none());
        assert!(api.cache().get("medications:row:7").await.is_none());
    }

    #[tokio::test]
    async fn test_row_keys_do_not_collide_with_list_key() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(LIST, 200, r#"[{"id":1},{"id":2}]"#);
        fetcher.respond(ROW_NAMED_LIST, 200, "[]");
        let api = api(fetcher.clone()).await;
        api.list("medications").await.unwrap();

        let row = api.get("medications", "list").await.unwrap();

        assert!(row.is_none());
        assert_eq!(fetcher.calls_to(ROW_NAMED_LIST), 1);
        assert_eq!(api.cache().get("medications:list").await.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_row_id_is_escaped_into_one_query_pair() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let injected = "https://medref.supabase.co/rest/v1/medications?select=*&id=eq.7%26select%3Dsecret";
        let fragment = "https://medref.supabase.co/rest/v1/medications?select=*&id=eq.7%23frag";
        fetcher.respond(injected, 200, "[]");
        fetcher.respond(fragment, 200, "[]");
        let api = api(fetcher.clone()).await;

        api.get("medications", "7&select=secret").await.unwrap();
        api.get("medications", "7#frag").await.unwrap();

        assert_eq!(fetcher.calls_to(injected), 1);
        assert_eq!(fetcher.calls_to(fragment), 1);
        assert_eq!(fetcher.calls_to(ROW), 0);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_table_keys_only() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(BY_ID, 200, r#"[{"id":7,"name":"Epinephrine 1mg"}]"#);
        let api = api(fetcher.clone()).await;
        let ttl = Duration::from_secs(60);
        api.cache().set("medications:list", Value::Array(Vec::new()), ttl).await;
        api.cache().set("medications:row:7", Value::Null, ttl).await;
        api.cache().set("protocols:list", Value::Array(Vec::new()), ttl).await;

        let written = api.update("medications", "7", &serde_json::json!({"name": "Epinephrine 1mg"})).await.unwrap();

        assert_eq!(written[0]["name"], "Epinephrine 1mg");
        assert!(api.cache().get("medications:list").await.is_none());
        assert!(api.cache().get("medications:row:7").await.is_none());
        assert!(api.cache().get("protocols:list").await.is_some());
        assert_eq!(fetcher.methods().last().unwrap(), "PATCH");
    }

    #[tokio::test]
    async fn test_failed_mutation_still_invalidates() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let api = api(fetcher).await;
        api.cache().set("medications:list", Value::Array(Vec::new()), Duration::from_secs(60)).await;

        let result = api.delete("medications", "7").await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert!(api.cache().get("medications:list").await.is_none());
    }

    #[tokio::test]
    async fn test_offline_read_maps_to_offline_error() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let api = api(fetcher).await;

        let result = api.list("medications").await;

        assert!(matches!(result, Err(Error::Offline(_))));
    }

    #[tokio::test]
    async fn test_offline_read_served_from_store_after_reload() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(LIST, 200, r#"[{"id":1}]"#);
        let api = api(fetcher.clone()).await;
        api.list("medications").await.unwrap();

        api.cache().clear().await;
        fetcher.fail(LIST);

        let rows = api.list("medications").await.unwrap();
        assert_eq!(rows[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_requests_carry_api_key() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(LIST, 200, "[]");
        let api = api(fetcher.clone()).await;

        api.list("medications").await.unwrap();

        let headers = fetcher.headers_seen();
        let last = headers.last().unwrap();
        assert_eq!(last.get("apikey").unwrap(), "anon");
    }

    #[tokio::test]
    async fn test_invalid_table_name() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let api = api(fetcher.clone()).await;
        let before = fetcher.calls();

        let result = api.list("medications; drop").await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(fetcher.calls(), before);
    }
}
