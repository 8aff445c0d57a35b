//! Mock fetcher and characteristic sink for testing.
//!
//! [`MockFetcher`] implements [`Fetcher`] without touching the network, and
//! [`RecordingSink`] implements [`CharacteristicSink`] by remembering every
//! update.
//!
//! # Features
//!
//! - **Canned responses**: queue responses, or set one that repeats
//! - **Failure injection**: fail the next N requests, or all of them
//! - **Latency simulation**: hold each request to exercise the overlap guard
//! - **Request log**: count requests and inspect the URLs they went to

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::RwLock;

use crate::accessory::{Characteristic, CharacteristicSink};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpResponse};

/// A mock HTTP fetcher.
///
/// # Example
///
/// ```
/// use airsense_core::fetch::{Fetcher, HttpResponse};
/// use airsense_core::mock::MockFetcher;
///
/// #[tokio::main]
/// async fn main() {
///     let fetcher = MockFetcher::new(HttpResponse::ok("[]"));
///     let url = "http://example.com/".parse().unwrap();
///     let response = fetcher.get(&url).await.unwrap();
///     assert_eq!(response.body, "[]");
///     assert_eq!(fetcher.request_count(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct MockFetcher {
    /// Returned when the queue is empty.
    response: RwLock<HttpResponse>,
    queued: RwLock<VecDeque<HttpResponse>>,
    urls: RwLock<Vec<String>>,
    request_count: AtomicU32,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    /// Number of requests to fail before succeeding.
    remaining_failures: AtomicU32,
    /// Simulated latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl MockFetcher {
    /// Create a fetcher that answers every request with `response`.
    pub fn new(response: HttpResponse) -> Self {
        Self {
            response: RwLock::new(response),
            queued: RwLock::new(VecDeque::new()),
            urls: RwLock::new(Vec::new()),
            request_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock failure".to_string()),
            remaining_failures: AtomicU32::new(0),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Create a fetcher that answers every request with 200 and `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(HttpResponse::ok(body))
    }

    /// Replace the repeating response.
    pub async fn set_response(&self, response: HttpResponse) {
        *self.response.write().await = response;
    }

    /// Queue a one-shot response, served before the repeating one.
    pub async fn push_response(&self, response: HttpResponse) {
        self.queued.write().await.push_back(response);
    }

    /// Make every request fail with a network error.
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(message) = message {
            *self.fail_message.write().await = message.to_string();
        }
    }

    /// Fail the next `count` requests, then recover.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Hold each request for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of requests issued so far, failed ones included.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// URLs requested so far, oldest first.
    pub async fn urls(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.urls.write().await.push(url.to_string());

        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::network(self.fail_message.read().await.clone()));
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::network(self.fail_message.read().await.clone()));
        }

        if let Some(response) = self.queued.write().await.pop_front() {
            return Ok(response);
        }
        Ok(self.response.read().await.clone())
    }
}

/// A characteristic sink that records every update.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<(String, Characteristic, f64)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update so far, oldest first.
    pub fn updates(&self) -> Vec<(String, Characteristic, f64)> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    /// Most recent value written to `characteristic`, on any accessory.
    pub fn latest(&self, characteristic: Characteristic) -> Option<f64> {
        self.updates()
            .into_iter()
            .rev()
            .find(|(_, c, _)| *c == characteristic)
            .map(|(_, _, value)| value)
    }

    /// Forget recorded updates.
    pub fn clear(&self) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.clear();
        }
    }
}

impl CharacteristicSink for RecordingSink {
    fn update_characteristic(&self, accessory: &str, characteristic: Characteristic, value: f64) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((accessory.to_string(), characteristic, value));
        }
    }
}
