//! Scripted network double for worker tests.

use crate::fetch::{Fetcher, Request, Response};
use async_trait::async_trait;
use medref_core::Error;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone)]
enum Scripted {
    Respond(Response),
    Fail,
}

/// Answers requests from a per-URL script and records every call.
///
/// Unscripted URLs fail like an offline network.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<(String, String)>>,
    headers_seen: Mutex<Vec<HeaderMap>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a JSON body and status.
    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let status = StatusCode::from_u16(status).unwrap();
        self.respond_with(url, Response::new(status, headers, body.to_string()));
    }

    pub(crate) fn respond_with(&self, url: &str, response: Response) {
        self.script.lock().unwrap().insert(url.to_string(), Scripted::Respond(response));
    }

    /// Make `url` fail at the transport level.
    pub(crate) fn fail(&self, url: &str) {
        self.script.lock().unwrap().insert(url.to_string(), Scripted::Fail);
    }

    /// Total number of fetches issued.
    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of fetches issued for `url` with any method.
    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, u)| u == url).count()
    }

    /// Methods used, in call order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Headers of every request, in call order.
    pub(crate) fn headers_seen(&self) -> Vec<HeaderMap> {
        self.headers_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push((request.method.to_string(), url.clone()));
        self.headers_seen.lock().unwrap().push(request.headers.clone());

        let scripted = self.script.lock().unwrap().get(&url).cloned();
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail) | None => Err(Error::Network(format!("TypeError: Failed to fetch {url}"))),
        }
    }
}
