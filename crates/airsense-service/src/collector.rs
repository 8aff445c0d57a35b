//! Background refresh collector.

use std::sync::Arc;

use tracing::{error, info};

use crate::state::AppState;

/// Runs every registered sensor's refresh loop, plus the cache writer.
pub struct Collector {
    state: Arc<AppState>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start refreshing all registered sensors.
    ///
    /// This spawns one task per sensor, each ticking once immediately and
    /// then on its own interval, and one task that persists published
    /// readings. Returns immediately; collection happens in the background
    /// until [`Collector::stop`].
    pub async fn start(&self) {
        if self.state.collector.is_running() {
            info!("Collector already running");
            return;
        }

        let sensors = self.state.sensors.read().await.clone();
        if sensors.is_empty() {
            info!("No sensors configured for collection");
            return;
        }

        info!("Starting collector for {} sensor(s)", sensors.len());
        self.state.collector.reset_stop();
        self.state.collector.set_running(true);

        for sensor in sensors {
            let stop = self.state.collector.subscribe_stop();
            tokio::spawn(Arc::clone(&sensor.refresher).run(stop));
        }

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            persist_published(state).await;
        });
    }

    /// Signal every collector task to stop.
    pub fn stop(&self) {
        info!("Stopping collector");
        self.state.collector.signal_stop();
    }
}

/// Save the accessory cache whenever a sensor publishes, until stopped.
async fn persist_published(state: Arc<AppState>) {
    let mut stop = state.collector.subscribe_stop();
    loop {
        tokio::select! {
            _ = state.sink.changed() => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(e) = state.persist().await {
            error!("Failed to save accessory cache: {}", e);
        }
    }

    // Final snapshot so the last cycle survives a restart.
    if let Err(e) = state.persist().await {
        error!("Failed to save accessory cache: {}", e);
    }
}
