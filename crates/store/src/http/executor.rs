use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, StoreError};

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Issues a GET request. A `timeout` of `None` leaves the client default in place.
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with [`StoreError::Network`] unless the status is in `[200, 300)`.
    pub fn ensure_success(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(StoreError::Network {
                url: url.to_string(),
                status: self.status,
                status_text: self.status_text,
            })
        }
    }
}
