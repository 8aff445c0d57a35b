//! Sensor accessory adapter.
//!
//! [`SensorAccessory`] is the boundary between the refresh pipeline and the
//! accessory framework. It holds the last published [`SensorReading`],
//! writes every characteristic through a [`CharacteristicSink`] on publish,
//! and hands the snapshot back as the persisted context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use airsense_types::SensorReading;

/// Observable characteristics of an air quality sensor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Characteristic {
    AirQuality,
    OzoneDensity,
    NitrogenDioxideDensity,
    SulphurDioxideDensity,
    #[serde(rename = "PM2_5Density")]
    Pm2_5Density,
    #[serde(rename = "PM10Density")]
    Pm10Density,
    CarbonMonoxideLevel,
    StatusFault,
}

impl Characteristic {
    /// Every characteristic, in publish order.
    pub const ALL: [Characteristic; 8] = [
        Characteristic::AirQuality,
        Characteristic::OzoneDensity,
        Characteristic::NitrogenDioxideDensity,
        Characteristic::SulphurDioxideDensity,
        Characteristic::Pm2_5Density,
        Characteristic::Pm10Density,
        Characteristic::CarbonMonoxideLevel,
        Characteristic::StatusFault,
    ];

    /// Characteristic name as the accessory framework spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::AirQuality => "AirQuality",
            Characteristic::OzoneDensity => "OzoneDensity",
            Characteristic::NitrogenDioxideDensity => "NitrogenDioxideDensity",
            Characteristic::SulphurDioxideDensity => "SulphurDioxideDensity",
            Characteristic::Pm2_5Density => "PM2_5Density",
            Characteristic::Pm10Density => "PM10Density",
            Characteristic::CarbonMonoxideLevel => "CarbonMonoxideLevel",
            Characteristic::StatusFault => "StatusFault",
        }
    }

    /// Numeric value of this characteristic in `reading`.
    pub fn value_of(&self, reading: &SensorReading) -> f64 {
        match self {
            Characteristic::AirQuality => f64::from(reading.air_quality as u8),
            Characteristic::OzoneDensity => reading.ozone_density,
            Characteristic::NitrogenDioxideDensity => reading.nitrogen_dioxide_density,
            Characteristic::SulphurDioxideDensity => reading.sulphur_dioxide_density,
            Characteristic::Pm2_5Density => reading.pm2_5_density,
            Characteristic::Pm10Density => reading.pm10_density,
            Characteristic::CarbonMonoxideLevel => reading.carbon_monoxide_level,
            Characteristic::StatusFault => f64::from(reading.status_fault as u8),
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write side of the accessory framework.
pub trait CharacteristicSink: Send + Sync {
    /// Push a new value for one characteristic of the sensor `accessory`.
    fn update_characteristic(&self, accessory: &str, characteristic: Characteristic, value: f64);
}

/// The published face of one sensor.
pub struct SensorAccessory {
    name: String,
    sink: Arc<dyn CharacteristicSink>,
    published: RwLock<SensorReading>,
}

impl fmt::Debug for SensorAccessory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorAccessory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SensorAccessory {
    /// Create an accessory, seeded from a persisted context when one exists.
    ///
    /// Restored sensors resume from their last published reading instead of
    /// the defaults.
    pub fn restore(
        name: impl Into<String>,
        sink: Arc<dyn CharacteristicSink>,
        context: Option<SensorReading>,
    ) -> Self {
        Self {
            name: name.into(),
            sink,
            published: RwLock::new(context.unwrap_or_default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write every characteristic of `reading` and keep it as the snapshot.
    pub async fn publish(&self, reading: &SensorReading) {
        let mut published = self.published.write().await;
        for characteristic in Characteristic::ALL {
            let value = characteristic.value_of(reading);
            debug!(accessory = %self.name, "updated {} characteristic: {}", characteristic, value);
            self.sink
                .update_characteristic(&self.name, characteristic, value);
        }
        *published = *reading;
    }

    /// Force the fault flag on and republish the current snapshot.
    ///
    /// Used after a failed cycle so the framework sees the fault even if a
    /// partial update went out first.
    pub async fn publish_fault(&self) {
        let faulted = self.context().await.with_fault();
        self.publish(&faulted).await;
    }

    /// The last published reading, persisted as the accessory context.
    pub async fn context(&self) -> SensorReading {
        *self.published.read().await
    }
}
