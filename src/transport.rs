//! Network transport for catalog resources
//!
//! Issues one GET per call and reports the body or a failure. Retries,
//! caching and decoding are left to the caller.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching a resource
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connect, DNS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Unexpected HTTP status: {0}")]
    Status(StatusCode),
}

/// Performs a single GET for a resource path
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `path` and returns the response body on success
    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest`-backed transport rooted at a base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client for making requests
    http_client: Client,
    /// URL that resource paths are relative to
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Creates a transport around an existing HTTP client
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and a resource path with a single `/`
    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "GET");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
