//! HTTP fetching behind a trait.
//!
//! The refresh controller only needs "GET this URL, give me status and
//! body". [`Fetcher`] captures that so cycles can run against
//! [`MockFetcher`](crate::mock::MockFetcher) in tests and against
//! [`HttpFetcher`] in the service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::{Error, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("airsense/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Something that can issue a GET request.
///
/// Implementations return `Ok` for any response that was fully read,
/// whatever its status; only transport and body-read failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a GET request to `url`.
    async fn get(&self, url: &Url) -> Result<HttpResponse>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        // Errors carry the URL by default, and the URL carries the API key.
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("failed to read body: {}", e.without_url())))?;

        Ok(HttpResponse { status, body })
    }
}
