//! The offline cache worker.
//!
//! [`Worker::handle`] is the dispatch table for the five events the host
//! delivers:
//!
//! | event | handler |
//! |-------|---------|
//! | `Install` | open stores, pre-cache the manifest, skip waiting |
//! | `Activate` | sweep obsolete stores, claim clients |
//! | `Fetch` | route to a lane strategy, or pass through |
//! | `Sync` | refresh the sync endpoints into the medical-data store |
//! | `Message` | `CLEAN_CACHE` runs the janitor; anything else is ignored |
//!
//! Every store and fetch call is an await point; events may interleave
//! freely. The stores are the only shared mutable state besides the
//! lifecycle flags below.

pub mod janitor;
pub mod lifecycle;
pub mod router;
pub mod strategy;
pub mod sync;

use crate::fetch::{Fetcher, Request, Response, resolve};
use chrono::Utc;
use medref_core::{AppConfig, CacheDb, Error, Store};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

pub use lifecycle::{ActivateReport, InstallReport, LifecycleState};
pub use router::{Lane, Route, Router};
pub use strategy::offline_response;
pub use sync::{SyncPlan, SyncReport};

/// Immutable worker settings, resolved once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub static_store: String,
    pub medical_store: String,
    pub runtime_store: String,
    pub manifest: Vec<Url>,
    pub sync_tag: String,
    pub sync: SyncPlan,
    pub retention: chrono::Duration,
    router: Router,
}

impl WorkerConfig {
    /// Resolve URLs and store names from the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;

        let manifest = config
            .precache_paths
            .iter()
            .map(|path| resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let endpoints = config
            .sync_endpoints
            .iter()
            .map(|url| crate::fetch::canonicalize(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            router: Router::new(&origin, &config.data_store_host),
            origin,
            static_store: config.static_store(),
            medical_store: config.medical_store(),
            runtime_store: config.runtime_store(),
            manifest,
            sync_tag: config.sync_tag.clone(),
            sync: SyncPlan::new(endpoints, config.sync_api_key.as_deref())?,
            retention: config.retention(),
        })
    }

    /// Store names of the current version.
    pub fn known_stores(&self) -> Vec<String> {
        vec![self.static_store.clone(), self.medical_store.clone(), self.runtime_store.clone()]
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The app shell document served to offline navigations.
    pub fn root(&self) -> Url {
        self.origin.join("/").unwrap_or_else(|_| self.origin.clone())
    }
}

/// A message posted to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "CLEAN_CACHE")]
    CleanCache,
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Interpret an arbitrary JSON payload; anything unrecognized is `Unknown`.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or(Message::Unknown)
    }
}

/// An event delivered by the host.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    Message(Message),
}

/// What the worker did with a fetch event.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The worker does not handle this request; the host performs it as-is.
    Passthrough,
    Respond { lane: Lane, response: Response },
}

/// What the worker did with an event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetch(FetchOutcome),
    Synced(SyncReport),
    Cleaned { removed: u64 },
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    state: LifecycleState,
    skip_waiting: bool,
    clients_claimed: bool,
}

/// The offline cache worker.
pub struct Worker {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    config: WorkerConfig,
    static_store: Store,
    medical_store: Store,
    runtime_store: Store,
    lifecycle: RwLock<Lifecycle>,
}

impl Worker {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, config: WorkerConfig) -> Self {
        Self {
            static_store: db.store(&config.static_store),
            medical_store: db.store(&config.medical_store),
            runtime_store: db.store(&config.runtime_store),
            db,
            fetcher,
            config,
            lifecycle: RwLock::new(Lifecycle {
                state: LifecycleState::Parsed,
                skip_waiting: false,
                clients_claimed: false,
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.read().await.state
    }

    /// Whether activation claimed the open clients.
    pub async fn clients_claimed(&self) -> bool {
        self.lifecycle.read().await.clients_claimed
    }

    /// Dispatch one event.
    pub async fn handle(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.on_fetch(&request).await.map(EventOutcome::Fetch),
            Event::Sync { tag } => Ok(match self.sync(&tag).await {
                Some(report) => EventOutcome::Synced(report),
                None => EventOutcome::Ignored,
            }),
            Event::Message(message) => self.on_message(&message).await,
        }
    }

    /// Install: open stores, pre-cache the manifest, then skip waiting.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let report = lifecycle::install(
            &self.db,
            self.fetcher.as_ref(),
            &self.config.known_stores(),
            &self.static_store,
            &self.config.manifest,
        )
        .await?;

        let mut lifecycle = self.lifecycle.write().await;
        if lifecycle.state != LifecycleState::Activated {
            lifecycle.state = LifecycleState::Installed;
        }
        lifecycle.skip_waiting = true;

        Ok(report)
    }

    /// Activate: sweep obsolete stores, then claim every client.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        if self.state().await == LifecycleState::Parsed {
            return Err(Error::InvalidInput("activate received before install".into()));
        }

        let report = lifecycle::activate(&self.db, &self.config.known_stores()).await?;

        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.state = LifecycleState::Activated;
        lifecycle.clients_claimed = true;
        tracing::info!(deleted = report.deleted.len(), "worker activated, clients claimed");

        Ok(report)
    }

    /// Route a fetch event.
    ///
    /// Before activation the worker controls nothing and every request passes
    /// through.
    pub async fn on_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if self.state().await != LifecycleState::Activated {
            return Ok(FetchOutcome::Passthrough);
        }

        let lane = match self.config.router.route(request) {
            Route::Passthrough => return Ok(FetchOutcome::Passthrough),
            Route::Lane(lane) => lane,
        };

        let fetcher = self.fetcher.as_ref();
        let response = match lane {
            Lane::MedicalData => strategy::network_first(fetcher, &self.medical_store, request).await,
            Lane::SameOrigin => {
                strategy::cache_first(fetcher, &self.db, &self.static_store, &self.config.root(), request).await?
            }
            Lane::External => strategy::network_with_fallback(fetcher, &self.runtime_store, request).await?,
        };

        Ok(FetchOutcome::Respond { lane, response })
    }

    /// Answer a request the way the host would: through the worker, or
    /// straight to the network on passthrough.
    pub async fn respond(&self, request: &Request) -> Result<Response, Error> {
        match self.on_fetch(request).await? {
            FetchOutcome::Respond { response, .. } => Ok(response),
            FetchOutcome::Passthrough => self.passthrough(request).await,
        }
    }

    /// Perform `request` against the network as-is, the way the host does for
    /// requests the worker does not handle.
    pub async fn passthrough(&self, request: &Request) -> Result<Response, Error> {
        self.fetcher.fetch(request).await
    }

    /// Run a sync pass if `tag` is the configured sync tag.
    pub async fn sync(&self, tag: &str) -> Option<SyncReport> {
        if tag != self.config.sync_tag {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return None;
        }
        Some(sync::run(self.fetcher.as_ref(), &self.medical_store, &self.config.sync).await)
    }

    async fn on_message(&self, message: &Message) -> Result<EventOutcome, Error> {
        match message {
            Message::CleanCache => {
                let removed = janitor::clean(&self.runtime_store, self.config.retention, Utc::now()).await?;
                Ok(EventOutcome::Cleaned { removed })
            }
            Message::Unknown => Ok(EventOutcome::Ignored),
        }
    }
}
