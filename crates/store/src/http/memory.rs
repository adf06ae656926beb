use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{HttpFetcher, HttpResponse};
use crate::error::{Result, StoreError};

/// In-memory fetcher serving canned responses.
///
/// Unknown URLs answer `404 Not Found`. Every request is recorded in order.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<(String, Option<Duration>)>>,
}

enum Canned {
    Response(HttpResponse),
    Timeout,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.with_body(url, body.to_string().into_bytes())
    }

    pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.insert(
            url,
            Canned::Response(HttpResponse {
                status: 200,
                status_text: "OK".to_string(),
                body: body.into(),
            }),
        );
        self
    }

    pub fn with_status(self, url: &str, status: u16, status_text: &str) -> Self {
        self.insert(
            url,
            Canned::Response(HttpResponse {
                status,
                status_text: status_text.to_string(),
                body: Vec::new(),
            }),
        );
        self
    }

    pub fn with_timeout(self, url: &str) -> Self {
        self.insert(url, Canned::Timeout);
        self
    }

    /// Replaces the JSON served for `url`.
    pub fn set_json(&self, url: &str, body: serde_json::Value) {
        self.insert(
            url,
            Canned::Response(HttpResponse {
                status: 200,
                status_text: "OK".to_string(),
                body: body.to_string().into_bytes(),
            }),
        );
    }

    /// URLs requested so far, in request order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.lock_requests().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Timeouts passed along with each request, in request order.
    pub fn requested_timeouts(&self) -> Vec<Option<Duration>> {
        self.lock_requests().iter().map(|(_, t)| *t).collect()
    }

    fn insert(&self, url: &str, canned: Canned) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), canned);
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<(String, Option<Duration>)>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse> {
        self.lock_requests().push((url.to_string(), timeout));

        let responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match responses.get(url) {
            Some(Canned::Response(response)) => Ok(response.clone()),
            Some(Canned::Timeout) => Err(StoreError::Timeout(url.to_string())),
            None => Ok(HttpResponse {
                status: 404,
                status_text: "Not Found".to_string(),
                body: Vec::new(),
            }),
        }
    }
}
