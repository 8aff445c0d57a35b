//! Refresh pipeline for air quality sensors.
//!
//! This crate turns a configured location into published sensor readings:
//! it asks an upstream air quality API for the current observation,
//! normalizes the provider-specific response onto a fixed set of pollutants,
//! merges it with the last known reading and writes the result to an
//! accessory framework.
//!
//! # Features
//!
//! - **Two providers**: AirNow (zip code or coordinates) and the World Air
//!   Quality Index (city, station or coordinates)
//! - **Sticky readings**: pollutants a provider stops reporting keep their
//!   last observed value
//! - **Fault reporting**: any failed cycle publishes a fault over the
//!   previous values instead of zeroing them
//! - **Overlap guard**: a tick that arrives mid-cycle is dropped
//! - **Mock support**: [`mock::MockFetcher`] and [`mock::RecordingSink`] for
//!   tests without network access
//!
//! # Supported Providers
//!
//! | Provider | Location | Response | Category |
//! |----------|----------|----------|----------|
//! | AirNow | zip code, lat/lon | array of observations | worst AQI of all records |
//! | Aqicn | city, lat/lon | `iaqi` object | last pollutant in the body |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use airsense_core::fetch::{DEFAULT_TIMEOUT, HttpFetcher};
//! use airsense_core::mock::RecordingSink;
//! use airsense_core::{Location, ProviderQuery, SensorAccessory, SensorRefresher};
//! use airsense_types::Provider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(HttpFetcher::new(DEFAULT_TIMEOUT)?);
//!     let sink = Arc::new(RecordingSink::new());
//!     let accessory = Arc::new(SensorAccessory::restore("Seattle", sink, None));
//!
//!     let query = ProviderQuery::new(Provider::AirNow, Location::place("98101", ""), "API_KEY");
//!     let refresher = SensorRefresher::new(query, fetcher, accessory.clone())
//!         .with_interval(Duration::from_secs(3600));
//!
//!     refresher.tick().await;
//!     println!("{:?}", accessory.context().await);
//!     Ok(())
//! }
//! ```

pub mod accessory;
pub mod aggregate;
pub mod error;
pub mod fetch;
pub mod mock;
pub mod parse;
pub mod provider;
pub mod refresh;

pub use accessory::{Characteristic, CharacteristicSink, SensorAccessory};
pub use aggregate::aggregate;
pub use error::{Error, ParseError, Result};
pub use fetch::{Fetcher, HttpFetcher, HttpResponse};
pub use parse::{NormalizedReadings, parse};
pub use provider::{Endpoints, Location, ProviderQuery};
pub use refresh::{CycleOutcome, CyclePhase, Logging, RefreshStats, SensorRefresher};

// Re-export the shared types so callers need only one dependency.
pub use airsense_types::{AirQuality, Pollutant, Provider, SensorReading, StatusFault, classify};
