//! In-memory TTL cache for parsed API results.
//!
//! Lives for one session only; nothing here touches the database. Writers
//! through the data-access layer drop affected keys with
//! [`AppCache::invalidate_pattern`] before returning.

use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};

use crate::config::MAX_APP_CACHE_TTL_SECS;

/// Default capacity (number of entries).
const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryTtl;

impl<V> Expiry<String, Entry<V>> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry<V>, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self, _key: &String, entry: &Entry<V>, _updated_at: Instant, _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Keyed cache with per-entry expiry.
///
/// Clones share the same entries.
#[derive(Clone)]
pub struct AppCache<V> {
    entries: Cache<String, Entry<V>>,
}

impl<V: Clone + Send + Sync + 'static> Default for AppCache<V> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<V: Clone + Send + Sync + 'static> AppCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryTtl)
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    /// Cached value for `key`, if present and not yet expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await.map(|entry| entry.value)
    }

    /// Store `value` under `key` until `ttl` has elapsed.
    ///
    /// TTLs longer than a day are capped.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let ttl = ttl.min(Duration::from_secs(MAX_APP_CACHE_TTL_SECS));
        self.entries.insert(key.into(), Entry { value, ttl }).await;
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).await.is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count.
    pub async fn invalidate_pattern(&self, prefix: &str) -> usize {
        self.entries.run_pending_tasks().await;
        let removed = self.entries.iter().filter(|(key, _)| key.starts_with(prefix)).count();
        if removed == 0 {
            return 0;
        }

        let owned = prefix.to_string();
        match self.entries.invalidate_entries_if(move |key, _| key.starts_with(&owned)) {
            Ok(_) => tracing::debug!(prefix, removed, "invalidated app cache entries"),
            Err(e) => {
                tracing::warn!(prefix, error = %e, "prefix invalidation rejected, clearing app cache");
                self.entries.invalidate_all();
            }
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of live entries, after evicting expired ones.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
