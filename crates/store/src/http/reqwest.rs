use std::time::Duration;

use async_trait::async_trait;

use super::{HttpFetcher, HttpResponse};
use crate::error::{Result, StoreError};

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse> {
        tracing::debug!(url, ?timeout, "Executing HTTP GET");

        let mut builder = self.client.get(url);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| map_error(url, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| map_error(url, e))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}

fn map_error(url: &str, error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(url.to_string())
    } else {
        StoreError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
