//! Refresh cycle controller.
//!
//! A [`SensorRefresher`] owns one sensor's pipeline: build the request from
//! its [`ProviderQuery`], fetch, parse, aggregate against the last published
//! reading and publish the result through the [`SensorAccessory`].
//!
//! Cycles never overlap. The controller tracks an explicit [`CyclePhase`]
//! and a tick that arrives while a cycle is in flight is dropped, not
//! queued:
//!
//! ```text
//!        tick (Idle only)           response / failure
//! Idle ─────────────────▶ Fetching ───────────────────▶ Applying
//!  ▲                                                       │
//!  └──────────────────── published ◀───────────────────────┘
//! ```
//!
//! The phase is held by a [`PhaseGuard`], so a cycle whose future is
//! dropped mid-flight still returns the sensor to `Idle`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};

use airsense_types::SensorReading;

use crate::accessory::SensorAccessory;
use crate::aggregate::aggregate;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::parse::{NormalizedReadings, parse};
use crate::provider::{Endpoints, ProviderQuery};

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH_RATE: u64 = 3600;

/// Number of consecutive failures logged at `warn` before going quiet.
const LOUD_FAILURES: u32 = 3;

/// Per-sensor log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logging {
    /// Cycle results and failures; diagnostics at `debug`.
    #[default]
    Standard,
    /// Like `Standard`, with diagnostics promoted to `info`.
    Debug,
    /// Nothing from this sensor's cycles.
    None,
}

impl fmt::Display for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logging::Standard => write!(f, "standard"),
            Logging::Debug => write!(f, "debug"),
            Logging::None => write!(f, "none"),
        }
    }
}

/// Where a sensor is in its refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Applying,
}

/// Holds a sensor's phase out of `Idle` for the lifetime of one cycle.
///
/// Dropping the guard returns the phase to `Idle`.
pub struct PhaseGuard<'a> {
    phase: &'a Mutex<CyclePhase>,
}

impl<'a> PhaseGuard<'a> {
    /// Move `Idle -> Fetching`, or return `None` if a cycle is in flight.
    pub fn begin(phase: &'a Mutex<CyclePhase>) -> Option<Self> {
        let mut current = lock(phase);
        if *current != CyclePhase::Idle {
            return None;
        }
        *current = CyclePhase::Fetching;
        Some(Self { phase })
    }

    /// Move the held cycle to `next`.
    pub fn advance(&self, next: CyclePhase) {
        *lock(self.phase) = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = CyclePhase::Idle;
    }
}

impl fmt::Debug for PhaseGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseGuard")
            .field("phase", &*lock(self.phase))
            .finish()
    }
}

// The phase is a plain value; a panic while it was held cannot leave it
// half-written.
fn lock(phase: &Mutex<CyclePhase>) -> MutexGuard<'_, CyclePhase> {
    phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a call to [`SensorRefresher::tick`] did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The cycle succeeded and this reading was published.
    Published(SensorReading),
    /// The cycle failed; the faulted reading was published.
    Faulted { reading: SensorReading, error: Error },
    /// A cycle was already in flight; nothing happened.
    Dropped,
}

impl CycleOutcome {
    /// The reading published by this cycle, if it ran.
    pub fn reading(&self) -> Option<&SensorReading> {
        match self {
            CycleOutcome::Published(reading) | CycleOutcome::Faulted { reading, .. } => {
                Some(reading)
            }
            CycleOutcome::Dropped => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, CycleOutcome::Dropped)
    }
}

/// Refresh statistics for one sensor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStats {
    /// Time of last successful cycle.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_poll_at: Option<OffsetDateTime>,
    /// Time of last failed cycle.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Total successful cycles.
    pub success_count: u64,
    /// Total failed cycles.
    pub failure_count: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl RefreshStats {
    fn record_success(&mut self) {
        self.last_poll_at = Some(OffsetDateTime::now_utc());
        self.success_count += 1;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, error: &Error) -> u32 {
        self.last_error_at = Some(OffsetDateTime::now_utc());
        self.last_error = Some(error.to_string());
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }
}

/// Drives one sensor's refresh cycles.
pub struct SensorRefresher {
    query: ProviderQuery,
    fetcher: Arc<dyn Fetcher>,
    accessory: Arc<SensorAccessory>,
    endpoints: Endpoints,
    interval: Duration,
    logging: Logging,
    phase: Mutex<CyclePhase>,
    stats: RwLock<RefreshStats>,
}

impl fmt::Debug for SensorRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRefresher")
            .field("sensor", &self.accessory.name())
            .field("query", &self.query)
            .field("interval", &self.interval)
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

impl SensorRefresher {
    /// Create a refresher publishing to `accessory`, with default interval,
    /// logging and endpoints.
    pub fn new(
        query: ProviderQuery,
        fetcher: Arc<dyn Fetcher>,
        accessory: Arc<SensorAccessory>,
    ) -> Self {
        Self {
            query,
            fetcher,
            accessory,
            endpoints: Endpoints::default(),
            interval: Duration::from_secs(DEFAULT_REFRESH_RATE),
            logging: Logging::default(),
            phase: Mutex::new(CyclePhase::Idle),
            stats: RwLock::new(RefreshStats::default()),
        }
    }

    /// Set the time between the end of one cycle and the start of the next.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Use non-default provider base URLs.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn query(&self) -> &ProviderQuery {
        &self.query
    }

    pub fn accessory(&self) -> &Arc<SensorAccessory> {
        &self.accessory
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> CyclePhase {
        *lock(&self.phase)
    }

    /// Snapshot of this sensor's statistics.
    pub async fn stats(&self) -> RefreshStats {
        self.stats.read().await.clone()
    }

    /// Run one refresh cycle, unless one is already in flight.
    ///
    /// Every failure is absorbed here: it is logged, counted, and published
    /// as a fault over the previous values.
    pub async fn tick(&self) -> CycleOutcome {
        let Some(guard) = PhaseGuard::begin(&self.phase) else {
            self.diagnostic(format_args!("refresh already in progress, dropping tick"));
            return CycleOutcome::Dropped;
        };

        let fetched = self.fetch().await;
        guard.advance(CyclePhase::Applying);

        let previous = self.accessory.context().await;
        match fetched {
            Ok(readings) => {
                let reading = aggregate(&previous, Ok::<_, Error>(&readings));
                self.accessory.publish(&reading).await;
                self.stats.write().await.record_success();
                if self.logging != Logging::None {
                    info!(
                        sensor = %self.accessory.name(),
                        "{} air quality is {}", self.query.provider(), reading.air_quality
                    );
                }
                CycleOutcome::Published(reading)
            }
            Err(error) => {
                let reading = aggregate(&previous, Err(&error));
                self.accessory.publish_fault().await;
                let consecutive = self.stats.write().await.record_failure(&error);
                self.report_failure(&error, consecutive);
                CycleOutcome::Faulted { reading, error }
            }
        }
    }

    /// Tick once now, then once per interval until `stop` turns true.
    ///
    /// The interval is measured from the end of each cycle, so a slow
    /// upstream stretches the period instead of stacking ticks.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        if self.logging != Logging::None {
            info!(
                sensor = %self.accessory.name(),
                "Starting refresh for {} (interval: {}s)",
                self.query,
                self.interval.as_secs()
            );
        }

        loop {
            if *stop.borrow() {
                break;
            }
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    // A closed channel means the owner is gone.
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        if self.logging != Logging::None {
            info!(sensor = %self.accessory.name(), "Refresh stopped");
        }
    }

    async fn fetch(&self) -> Result<NormalizedReadings> {
        let url = self.query.url(&self.endpoints)?;
        self.diagnostic(format_args!("fetching {}", self.query));

        let response = self.fetcher.get(&url).await?;
        if !response.is_ok() {
            return Err(Error::http_status(response.status, &response.body));
        }
        self.diagnostic(format_args!("response: {}", response.body));

        parse(self.query.provider(), &response.body).map_err(|source| {
            Error::parse(self.query.provider().clone(), response.status, &response.body, source)
        })
    }

    fn report_failure(&self, error: &Error, consecutive: u32) {
        if self.logging == Logging::None {
            return;
        }
        let sensor = self.accessory.name();
        if consecutive <= LOUD_FAILURES {
            warn!(sensor = %sensor, "Failed to refresh: {} (attempt {})", error, consecutive);
        } else if consecutive == LOUD_FAILURES + 1 {
            error!(
                sensor = %sensor,
                "Failed to refresh after {} attempts, will continue trying silently: {}",
                consecutive, error
            );
        } else {
            debug!(sensor = %sensor, "Failed to refresh: {} (attempt {})", error, consecutive);
        }
        if let Some(body) = error.body() {
            self.diagnostic(format_args!("raw response body: {body}"));
        }
    }

    /// Log at `debug`, or `info` when the sensor asks for debug logging.
    fn diagnostic(&self, message: fmt::Arguments<'_>) {
        match self.logging {
            Logging::Standard => debug!(sensor = %self.accessory.name(), "{}", message),
            Logging::Debug => info!(sensor = %self.accessory.name(), "[DEBUG] {}", message),
            Logging::None => {}
        }
    }
}
