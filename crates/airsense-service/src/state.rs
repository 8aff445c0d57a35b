//! Application state shared across handlers and collector tasks.
//!
//! # Publishing
//!
//! Every sensor publishes through the same [`ServiceSink`]. The sink counts
//! characteristic writes and wakes the cache writer, which snapshots every
//! sensor's published reading into the [`AccessoryCache`]. Writes arrive in
//! bursts of eight per cycle; the wakeup coalesces them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tracing::{debug, trace};
use uuid::Uuid;

use airsense_core::{Characteristic, CharacteristicSink, SensorRefresher};

use crate::cache::{AccessoryCache, CacheError};
use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// Configuration.
    pub config: RwLock<Config>,
    /// Accessory cache (wrapped in Mutex for exclusive file writes).
    pub cache: Mutex<AccessoryCache>,
    /// Registered sensors.
    pub sensors: RwLock<Vec<Arc<SensorHandle>>>,
    /// Where every sensor publishes.
    pub sink: Arc<ServiceSink>,
    /// Collector control state.
    pub collector: CollectorState,
}

impl AppState {
    /// Create new application state with no sensors registered.
    pub fn new(config: Config, cache: AccessoryCache) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            cache: Mutex::new(cache),
            sensors: RwLock::new(Vec::new()),
            sink: Arc::new(ServiceSink::new()),
            collector: CollectorState::new(),
        })
    }

    /// Look up a registered sensor.
    pub async fn sensor(&self, id: &Uuid) -> Option<Arc<SensorHandle>> {
        self.sensors.read().await.iter().find(|s| &s.id == id).cloned()
    }

    /// Copy every sensor's published reading into the cache and save it.
    pub async fn persist(&self) -> Result<(), CacheError> {
        let sensors = self.sensors.read().await.clone();
        let mut cache = self.cache.lock().await;
        for sensor in &sensors {
            let reading = sensor.refresher.accessory().context().await;
            cache.update(sensor.id, &sensor.info.name, reading);
        }
        cache.save()?;
        debug!("Saved {} accessories to {}", sensors.len(), cache.path().display());
        Ok(())
    }
}

/// Accessory information shown alongside a sensor's readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInfo {
    /// Cleaned display name.
    pub name: String,
    /// Provider model (`AirNow`, `Aqicn` or `Unknown`).
    pub model: String,
    pub serial_number: String,
    /// Normalized firmware revision.
    pub firmware_revision: String,
}

/// A registered sensor and its refresh pipeline.
#[derive(Debug)]
pub struct SensorHandle {
    pub id: Uuid,
    pub info: AccessoryInfo,
    pub refresher: Arc<SensorRefresher>,
}

/// Characteristic sink shared by every sensor.
#[derive(Debug, Default)]
pub struct ServiceSink {
    updates: AtomicU64,
    changed: Notify,
}

impl ServiceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total characteristic writes so far.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Wait until at least one write has happened since the last wakeup.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

impl CharacteristicSink for ServiceSink {
    fn update_characteristic(&self, accessory: &str, characteristic: Characteristic, value: f64) {
        trace!(accessory, %characteristic, value, "characteristic updated");
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.changed.notify_one();
    }
}

/// State for tracking and controlling the collector.
pub struct CollectorState {
    /// Whether the collector is currently running.
    running: AtomicBool,
    /// When the collector was started (Unix timestamp).
    started_at: AtomicU64,
    /// Channel to signal collector tasks to stop.
    stop_tx: watch::Sender<bool>,
    /// Receiver for stop signal (cloned by collector tasks).
    stop_rx: watch::Receiver<bool>,
}

impl CollectorState {
    /// Create a new collector state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
        }
    }

    /// Check if the collector is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the collector as started.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the collector start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal all collector tasks to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }
}

impl Default for CollectorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsense_core::mock::MockFetcher;
    use airsense_core::{Location, Provider, ProviderQuery, SensorAccessory};

    fn handle(state: &AppState, name: &str) -> Arc<SensorHandle> {
        let accessory = Arc::new(SensorAccessory::restore(name, state.sink.clone(), None));
        let query = ProviderQuery::new(Provider::AirNow, Location::place("98101", ""), "KEY");
        let fetcher = Arc::new(MockFetcher::ok(r#"[{"ParameterName":"PM10","AQI":120}]"#));
        Arc::new(SensorHandle {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            info: AccessoryInfo {
                name: name.to_string(),
                model: "AirNow".to_string(),
                serial_number: "98101".to_string(),
                firmware_revision: "1.0.0".to_string(),
            },
            refresher: Arc::new(SensorRefresher::new(query, fetcher, accessory)),
        })
    }

    #[tokio::test]
    async fn test_app_state_new() {
        let state = AppState::new(Config::default(), AccessoryCache::new("unused.json"));
        let config = state.config.read().await;
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(state.sensors.read().await.is_empty());
        assert_eq!(state.sink.updates(), 0);
    }

    #[test]
    fn test_collector_state() {
        let collector = CollectorState::new();
        assert!(!collector.is_running());
        assert!(collector.started_at().is_none());

        collector.set_running(true);
        assert!(collector.is_running());
        assert!(collector.started_at().is_some());

        let stop = collector.subscribe_stop();
        collector.signal_stop();
        assert!(!collector.is_running());
        assert!(*stop.borrow());

        collector.reset_stop();
        assert!(!*stop.borrow());
    }

    #[tokio::test]
    async fn test_sink_counts_and_wakes() {
        let sink = ServiceSink::new();
        sink.update_characteristic("Seattle", Characteristic::AirQuality, 3.0);
        sink.update_characteristic("Seattle", Characteristic::StatusFault, 0.0);
        assert_eq!(sink.updates(), 2);
        // A stored permit makes this return immediately.
        tokio::time::timeout(std::time::Duration::from_secs(1), sink.changed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sensor_lookup() {
        let state = AppState::new(Config::default(), AccessoryCache::new("unused.json"));
        let sensor = handle(&state, "Seattle");
        state.sensors.write().await.push(sensor.clone());

        assert!(state.sensor(&sensor.id).await.is_some());
        assert!(state.sensor(&Uuid::nil()).await.is_none());
    }

    #[tokio::test]
    async fn test_persist_writes_published_readings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("accessories.json");
        let state = AppState::new(Config::default(), AccessoryCache::new(&path));
        let sensor = handle(&state, "Seattle");
        state.sensors.write().await.push(sensor.clone());

        sensor.refresher.tick().await;
        state.persist().await.unwrap();

        let cache = AccessoryCache::open(&path).unwrap();
        let entry = cache.get(&sensor.id).unwrap();
        assert_eq!(entry.name, "Seattle");
        assert_eq!(entry.reading.pm10_density, 120.0);
    }
}
