//! Platform-agnostic types for air quality sensors.
//!
//! This crate provides the shared vocabulary used by the refresh pipeline
//! (airsense-core) and the background service (airsense-service).
//!
//! # Features
//!
//! - The [`SensorReading`] published for every sensor
//! - The [`classify`] function mapping an AQI onto an [`AirQuality`] category
//! - [`Pollutant`] and [`Provider`] identifiers with their upstream spellings
//!
//! # Example
//!
//! ```
//! use airsense_types::{AirQuality, Pollutant, SensorReading, classify};
//!
//! let mut reading = SensorReading::default();
//! reading.set(Pollutant::Pm10, 120.0);
//! reading.air_quality = classify(Some(120.0));
//! assert_eq!(reading.air_quality, AirQuality::Fair);
//! ```

pub mod types;

pub use types::{AirQuality, Pollutant, Provider, SensorReading, StatusFault, classify};
