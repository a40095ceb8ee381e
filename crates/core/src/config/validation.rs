//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Longest accepted runtime retention window (one year).
pub const MAX_RETENTION_HOURS: u64 = 24 * 365;

/// Longest accepted in-memory cache TTL (one day).
pub const MAX_APP_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()))
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `origin`, `data_store_url` or any sync endpoint is not an http(s) URL
    /// - `cache_prefix`, `cache_version`, `user_agent` or `data_store_host` is empty
    /// - `retention_hours` is 0 or exceeds [`MAX_RETENTION_HOURS`]
    /// - `app_cache_ttl_secs` exceeds [`MAX_APP_CACHE_TTL_SECS`]
    /// - a pre-cache path does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if !is_http_url(&self.origin) {
            return Err(invalid("origin", "must be an http(s) URL"));
        }
        if !is_http_url(&self.data_store_url) {
            return Err(invalid("data_store_url", "must be an http(s) URL"));
        }
        if self.data_store_host.is_empty() {
            return Err(invalid("data_store_host", "must not be empty"));
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.retention_hours == 0 {
            return Err(invalid("retention_hours", "must be greater than 0"));
        }
        if self.retention_hours > MAX_RETENTION_HOURS {
            return Err(invalid("retention_hours", "must not exceed one year (8760 hours)"));
        }
        if self.app_cache_ttl_secs > MAX_APP_CACHE_TTL_SECS {
            return Err(invalid("app_cache_ttl_secs", "must not exceed one day (86400 seconds)"));
        }

        if let Some(path) = self.precache_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_paths".into(),
                reason: format!("'{path}' must start with '/'"),
            });
        }

        if let Some(endpoint) = self.sync_endpoints.iter().find(|e| !is_http_url(e)) {
            return Err(ConfigError::Invalid {
                field: "sync_endpoints".into(),
                reason: format!("'{endpoint}' must be an http(s) URL"),
            });
        }

        if !self.sync_endpoints.is_empty() && self.sync_api_key.is_none() {
            tracing::warn!(
                endpoints = self.sync_endpoints.len(),
                "sync_endpoints configured without sync_api_key; \
                 background sync requests will be sent unauthenticated"
            );
        }

        Ok(())
    }
}
