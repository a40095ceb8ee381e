//! Named store operations.
//!
//! `CacheDb` manages the set of stores (open, list, delete, lookup across all
//! of them); a `Store` handle reads and writes entries of a single store.

use super::connection::CacheDb;
use super::key::request_key;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A response as persisted in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One row of a store, with its request identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub stored_at: String,
    pub response: CachedResponse,
}

/// Store name with its entry count and total body size.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
    pub body_bytes: u64,
}

/// Handle to one named store.
///
/// Cheap to clone; every clone talks to the same database connection.
#[derive(Clone, Debug)]
pub struct Store {
    db: CacheDb,
    name: String,
}

fn row_to_response(status: i64, headers_json: &str, body: Vec<u8>) -> Result<CachedResponse, Error> {
    let headers: Vec<(String, String)> = serde_json::from_str(headers_json)?;
    let status = u16::try_from(status).map_err(|_| Error::DecodeFailed(format!("status {status} out of range")))?;
    Ok(CachedResponse { status, headers, body })
}

impl CacheDb {
    /// Handle to a store without touching the database.
    ///
    /// The store row is created by [`CacheDb::open_store`] or by the first
    /// [`Store::put`].
    pub fn store(&self, name: &str) -> Store {
        Store { db: self.clone(), name: name.to_string() }
    }

    /// Open a store, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<Store, Error> {
        let owned = name.to_string();
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Store { db: self.clone(), name: name.to_string() })
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every store, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and sizes for every store, oldest first.
    pub async fn store_summaries(&self) -> Result<Vec<StoreSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<StoreSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT s.name, s.created_at, COUNT(e.key_hash), COALESCE(SUM(e.body_len), 0)
                     FROM stores s LEFT JOIN entries e ON e.store_name = s.name
                     GROUP BY s.name ORDER BY s.rowid",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(StoreSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            body_bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store had this name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up in every store, oldest store first.
    pub async fn match_any(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key = request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.headers_json, e.body
                         FROM entries e JOIN stores s ON s.name = e.store_name
                         WHERE e.key_hash = ?1
                         ORDER BY s.rowid LIMIT 1",
                        params![key],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                    )
                    .optional()?;

                row.map(|(status, headers, body)| row_to_response(status, &headers, body))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }
}

impl Store {
    /// Name of this store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace the response stored for a request.
    ///
    /// Re-creates the store row if it was deleted in the meantime, so a write
    /// racing an activation sweep lands in a fresh store instead of failing.
    pub async fn put(&self, method: &str, url: &str, response: &CachedResponse) -> Result<(), Error> {
        let store = self.name.clone();
        let method = method.to_ascii_uppercase();
        let key = request_key(&method, url);
        let url = url.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status as i64;
        let body = response.body.clone();
        let body_len = body.len() as i64;
        let stored_at = Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![store, stored_at],
                )?;
                conn.execute(
                    "INSERT INTO entries (store_name, key_hash, method, url, status, headers_json, body, body_len, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(store_name, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        body_len = excluded.body_len,
                        stored_at = excluded.stored_at",
                    params![store, key, method, url, status, headers_json, body, body_len, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored for a request.
    pub async fn get(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let store = self.name.clone();
        let key = request_key(method, url);
        self.db
            .conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, headers_json, body FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                        params![store, key],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                    )
                    .optional()?;

                row.map(|(status, headers, body)| row_to_response(status, &headers, body))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a request. Returns false if there was none.
    pub async fn delete(&self, method: &str, url: &str) -> Result<bool, Error> {
        self.delete_key(&request_key(method, url)).await
    }

    /// Delete an entry by its key hash. Returns false if there was none.
    pub async fn delete_key(&self, key: &str) -> Result<bool, Error> {
        let store = self.name.clone();
        let key = key.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![store, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Every entry of this store, in insertion order.
    pub async fn entries(&self) -> Result<Vec<StoreEntry>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<StoreEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, method, url, stored_at, status, headers_json, body
                     FROM entries WHERE store_name = ?1 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(params![store], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, Vec<u8>>(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;

                rows.into_iter()
                    .map(|(key, method, url, stored_at, status, headers, body)| {
                        Ok(StoreEntry { key, method, url, stored_at, response: row_to_response(status, &headers, body)? })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this store.
    pub async fn len(&self) -> Result<u64, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store_name = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_response(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-medical-data-v2").await.unwrap();
        let url = "https://medref.supabase.co/rest/v1/medications?select=*";

        store.put("GET", url, &json_response(r#"{"data":[]}"#)).await.unwrap();

        let cached = store.get("GET", url).await.unwrap().unwrap();
        assert_eq!(cached.body, br#"{"data":[]}"#);
        assert_eq!(cached.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-static-v2").await.unwrap();
        assert!(store.get("GET", "http://localhost:8080/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_twice_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-runtime-v2").await.unwrap();
        let url = "https://fonts.example.com/inter.css";

        store.put("GET", url, &json_response("old")).await.unwrap();
        store.put("GET", url, &json_response("new")).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.get("GET", url).await.unwrap().unwrap().body, b"new");
    }

    #[tokio::test]
    async fn test_stores_are_independent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let a = db.open_store("app-static-v2").await.unwrap();
        let b = db.open_store("app-runtime-v2").await.unwrap();

        a.put("GET", "http://localhost:8080/", &json_response("shell")).await.unwrap();

        assert!(b.get("GET", "http://localhost:8080/").await.unwrap().is_none());
        assert!(b.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_open_store_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("app-static-v2").await.unwrap();
        db.open_store("app-static-v2").await.unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["app-static-v2".to_string()]);
        assert!(db.has_store("app-static-v2").await.unwrap());
        assert!(!db.has_store("app-static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-runtime-v1").await.unwrap();
        store.put("GET", "https://cdn.example.com/a.js", &json_response("a")).await.unwrap();

        assert!(db.delete_store("app-runtime-v1").await.unwrap());
        assert!(!db.delete_store("app-runtime-v1").await.unwrap());
        assert!(db.match_any("GET", "https://cdn.example.com/a.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_recreates_deleted_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-medical-data-v2").await.unwrap();
        db.delete_store("app-medical-data-v2").await.unwrap();

        store.put("GET", "https://medref.supabase.co/rest/v1/medications", &json_response("[]")).await.unwrap();

        assert!(db.has_store("app-medical-data-v2").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_any_searches_every_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("app-static-v2").await.unwrap();
        let runtime = db.open_store("app-runtime-v2").await.unwrap();
        runtime.put("GET", "https://cdn.example.com/a.js", &json_response("a")).await.unwrap();

        let hit = db.match_any("GET", "https://cdn.example.com/a.js").await.unwrap();
        assert_eq!(hit.unwrap().body, b"a");
        assert!(db.match_any("POST", "https://cdn.example.com/a.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_and_delete_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-runtime-v2").await.unwrap();
        store.put("GET", "https://cdn.example.com/a.js", &json_response("a")).await.unwrap();
        store.put("get", "https://cdn.example.com/b.js", &json_response("b")).await.unwrap();

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].method, "GET");
        assert_eq!(entries[0].url, "https://cdn.example.com/a.js");

        assert!(store.delete_key(&entries[0].key).await.unwrap());
        assert!(store.delete("GET", "https://cdn.example.com/b.js").await.unwrap());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_store_summaries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("app-static-v2").await.unwrap();
        db.open_store("app-runtime-v2").await.unwrap();
        store.put("GET", "http://localhost:8080/", &json_response("shell")).await.unwrap();

        let summaries = db.store_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "app-static-v2");
        assert_eq!(summaries[0].entries, 1);
        assert_eq!(summaries[0].body_bytes, 5);
        assert_eq!(summaries[1].entries, 0);
    }
}
