//! Request/response model and the network fetcher.
//!
//! ### Request identity
//! - URLs are canonicalized on construction (see [`url::canonicalize`])
//! - Only GET requests are ever written to a store
//!
//! ### Responses
//! - Bodies are [`Bytes`], so a strategy can hand one copy to the caller and
//!   persist another without either consuming the other
//! - Any HTTP status is a successful fetch; only transport failures are errors
//!
//! ### Network
//! - [`Fetcher`] is the seam between the worker and the network
//! - [`HttpFetcher`] implements it with reqwest

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use medref_core::{CachedResponse, Error};

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Subresource or API call.
    #[default]
    Cors,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Canonical URL (fragment removed).
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
}

impl Request {
    /// Build a request, canonicalizing the URL.
    pub fn new(method: Method, url: &str) -> Result<Self, Error> {
        let url = canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { method, url, headers: HeaderMap::new(), body: None, mode: RequestMode::Cors })
    }

    /// A GET request.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new(Method::GET, url)
    }

    /// A top-level GET navigation.
    pub fn navigate(url: &str) -> Result<Self, Error> {
        Ok(Self { mode: RequestMode::Navigate, ..Self::get(url)? })
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| Error::InvalidInput(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Merge a header map into this request.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response, either fresh from the network, read from a store, or synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// A response with a JSON body and content type.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status, headers, body: Bytes::from(value.to_string()) }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// Parse the body as JSON.
    pub fn parse_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::DecodeFailed(e.to_string()))
    }

    /// Copy into the persisted form.
    ///
    /// Headers that are not valid UTF-8 are dropped.
    pub fn to_cached(&self) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        CachedResponse { status: self.status.as_u16(), headers, body: self.body.to_vec() }
    }

    /// Rebuild from the persisted form.
    pub fn from_cached(cached: CachedResponse) -> Result<Self, Error> {
        let status = StatusCode::from_u16(cached.status).map_err(|e| Error::DecodeFailed(e.to_string()))?;
        let mut headers = HeaderMap::with_capacity(cached.headers.len());
        for (name, value) in &cached.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::DecodeFailed(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::DecodeFailed(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(Self { status, headers, body: Bytes::from(cached.body) })
    }
}

/// Issues requests to the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request.
    ///
    /// Returns `Err(Error::Network)` only for transport failures; HTTP error
    /// statuses come back as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "medref-worker/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "medref-worker/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&medref_core::AppConfig> for FetchConfig {
    fn from(config: &medref_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out after {:?}: {}", self.config.timeout, request.url))
            } else {
                Error::Network(format!("{}: {e}", request.url))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { status, headers, body })
    }
}
