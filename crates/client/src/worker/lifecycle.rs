//! Install and activate.
//!
//! Install opens every store of the current version and pre-caches the
//! critical manifest; activate sweeps stores left behind by older versions.

use crate::fetch::{Fetcher, Request};
use medref_core::{CacheDb, Error, Store};
use reqwest::Url;
use serde::Serialize;

/// Where the worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed; no event handled yet.
    Parsed,
    /// Install finished; waiting to activate unless skip-waiting was signalled.
    Installed,
    /// Controls every client; fetch events are routed.
    Activated,
}

/// Result of an install pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub opened: Vec<String>,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Result of an activate pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
}

/// Open every known store and pre-cache `manifest` into `static_store`.
///
/// Individual pre-cache failures are logged and skipped. Fails only when no
/// store could be opened at all.
pub async fn install(
    db: &CacheDb, fetcher: &dyn Fetcher, known: &[String], static_store: &Store, manifest: &[Url],
) -> Result<InstallReport, Error> {
    let mut report = InstallReport::default();

    for name in known {
        match db.open_store(name).await {
            Ok(_) => report.opened.push(name.clone()),
            Err(e) => tracing::warn!(store = %name, error = %e, "failed to open store"),
        }
    }

    if report.opened.is_empty() {
        return Err(Error::StoreUnavailable(format!("none of {} stores could be opened", known.len())));
    }

    for url in manifest {
        match precache(fetcher, static_store, url).await {
            Ok(()) => report.cached.push(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "failed to pre-cache critical resource");
                report.failed.push(url.to_string());
            }
        }
    }

    tracing::info!(
        opened = report.opened.len(),
        cached = report.cached.len(),
        failed = report.failed.len(),
        "install complete"
    );

    Ok(report)
}

async fn precache(fetcher: &dyn Fetcher, store: &Store, url: &Url) -> Result<(), Error> {
    let request = Request::get(url.as_str())?;
    let response = fetcher.fetch(&request).await?;
    if !response.is_success() {
        return Err(Error::HttpError(format!("status {}", response.status.as_u16())));
    }
    store.put("GET", request.url.as_str(), &response.to_cached()).await
}

/// Delete every store whose name is not in `known`.
pub async fn activate(db: &CacheDb, known: &[String]) -> Result<ActivateReport, Error> {
    let mut report = ActivateReport::default();

    for name in db.store_names().await? {
        if known.contains(&name) {
            continue;
        }
        if db.delete_store(&name).await? {
            tracing::info!(store = %name, "deleted obsolete store");
            report.deleted.push(name);
        }
    }

    Ok(report)
}
