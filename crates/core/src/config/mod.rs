//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MEDREF_*)
//! 2. TOML config file (if MEDREF_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::{ConfigError, MAX_APP_CACHE_TTL_SECS, MAX_RETENTION_HOURS};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MEDREF_*)
/// 2. TOML config file (if MEDREF_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding every named store.
    ///
    /// Set via MEDREF_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker serves (scheme, host and port).
    ///
    /// Requests with this origin land in the same-origin lane.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Base URL of the remote data store's REST interface.
    #[serde(default = "default_data_store_url")]
    pub data_store_url: String,

    /// Host suffix identifying the remote data store.
    ///
    /// Any request whose host equals this or is a subdomain of it is medical data.
    #[serde(default = "default_data_store_host")]
    pub data_store_host: String,

    /// Prefix for store names, e.g. `app` in `app-static-v2`.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version suffix for store names. Bumping it orphans every older store.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum age, in hours, of a runtime entry before the janitor removes it.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Same-origin paths pre-cached into the static store on install.
    #[serde(default = "default_precache_paths")]
    pub precache_paths: Vec<String>,

    /// Tag of the sync event that triggers a background refresh.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Fully-qualified medical-data URLs refreshed on every sync pass.
    #[serde(default = "default_sync_endpoints")]
    pub sync_endpoints: Vec<String>,

    /// API key sent with sync requests as `apikey` and bearer token.
    ///
    /// Set via MEDREF_SYNC_API_KEY environment variable.
    #[serde(default)]
    pub sync_api_key: Option<String>,

    /// Seconds between host-driven sync ticks. Zero disables the ticker.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// TTL of parsed rows in the in-memory application cache.
    #[serde(default = "default_app_cache_ttl_secs")]
    pub app_cache_ttl_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./medref-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_data_store_url() -> String {
    "https://medref.supabase.co".into()
}

fn default_data_store_host() -> String {
    "supabase.co".into()
}

fn default_cache_prefix() -> String {
    "app".into()
}

fn default_cache_version() -> String {
    "v2".into()
}

fn default_user_agent() -> String {
    "medref-worker/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_retention_hours() -> u64 {
    24
}

fn default_precache_paths() -> Vec<String> {
    ["/", "/medications", "/favorites", "/manifest.json", "/placeholder.svg"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sync_tag() -> String {
    "background-sync".into()
}

fn default_sync_endpoints() -> Vec<String> {
    let base = default_data_store_url();
    ["medications", "medication_dosing", "medication_indications", "medication_contraindications"]
        .into_iter()
        .map(|table| format!("{base}/rest/v1/{table}?select=*"))
        .collect()
}

fn default_sync_interval_secs() -> u64 {
    900
}

fn default_app_cache_ttl_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            data_store_url: default_data_store_url(),
            data_store_host: default_data_store_host(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            retention_hours: default_retention_hours(),
            precache_paths: default_precache_paths(),
            sync_tag: default_sync_tag(),
            sync_endpoints: default_sync_endpoints(),
            sync_api_key: None,
            sync_interval_secs: default_sync_interval_secs(),
            app_cache_ttl_secs: default_app_cache_ttl_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retention window as a chrono duration for comparing against HTTP dates.
    ///
    /// Capped at [`MAX_RETENTION_HOURS`].
    pub fn retention(&self) -> chrono::Duration {
        let hours = self.retention_hours.min(MAX_RETENTION_HOURS);
        i64::try_from(hours).map_or(chrono::Duration::MAX, chrono::Duration::hours)
    }

    /// Interval between sync ticks, or `None` when the ticker is disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }

    /// TTL for the in-memory application cache, capped at [`MAX_APP_CACHE_TTL_SECS`].
    pub fn app_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.app_cache_ttl_secs.min(MAX_APP_CACHE_TTL_SECS))
    }

    /// Name of the static (app shell) store.
    pub fn static_store(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.cache_version)
    }

    /// Name of the medical-data store.
    pub fn medical_store(&self) -> String {
        format!("{}-medical-data-{}", self.cache_prefix, self.cache_version)
    }

    /// Name of the runtime (external resources) store.
    pub fn runtime_store(&self) -> String {
        format!("{}-runtime-{}", self.cache_prefix, self.cache_version)
    }

    /// Every store name that belongs to the current version.
    pub fn known_stores(&self) -> Vec<String> {
        vec![self.static_store(), self.medical_store(), self.runtime_store()]
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MEDREF_`
    /// 2. TOML file from `MEDREF_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MEDREF_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MEDREF_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
