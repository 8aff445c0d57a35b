//! Background refresh service and HTTP REST API for air quality sensors.
//!
//! This crate provides a service that:
//! - Runs one refresh pipeline per configured sensor
//! - Persists each sensor's published reading in an accessory cache
//! - Exposes a REST API for the published state and manual refreshes
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Collector state and per-sensor statistics
//! - `GET /api/sensors` - All sensors with their published readings
//! - `GET /api/sensors/{id}` - One sensor
//! - `POST /api/sensors/{id}/refresh` - Run a refresh cycle now
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/airsense/config.toml`.
//! Per-device settings fall back to `[options]`, then to defaults:
//!
//! ```toml
//! [options]
//! api_key = "your-airnow-key"
//! refresh_rate = 1800
//! logging = "standard"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "/var/lib/airsense/accessories.json"
//!
//! [[devices]]
//! provider = "airnow"
//! zip_code = "98101"
//! city = "Seattle"
//!
//! [[devices]]
//! provider = "aqicn"
//! api_key = "your-waqi-token"
//! latitude = 48.8566
//! longitude = 2.3522
//! refresh_rate = 600
//! ```

pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod registry;
pub mod state;

pub use cache::{AccessoryCache, CacheError};
pub use collector::Collector;
pub use config::{
    Config, ConfigError, DeviceConfig, HttpConfig, PlatformOptions, ResolvedDevice, ServerConfig,
    Source, StorageConfig, Tiered,
};
pub use state::{AppState, SensorHandle, ServiceSink};
