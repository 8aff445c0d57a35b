//! Core types for air quality sensor readings.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Categorical air quality, as exposed by HomeKit-style accessories.
///
/// # Ordering
///
/// Values are ordered by severity: `Unknown < Excellent < Good < Fair < Inferior < Poor`.
///
/// ```
/// use airsense_types::AirQuality;
///
/// assert!(AirQuality::Poor > AirQuality::Fair);
/// assert_eq!(AirQuality::Good as u8, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AirQuality {
    /// Unknown or invalid AQI.
    #[default]
    Unknown = 0,
    /// AQI 0-50.
    Excellent = 1,
    /// AQI 51-100.
    Good = 2,
    /// AQI 101-150.
    Fair = 3,
    /// AQI 151-200.
    Inferior = 4,
    /// AQI above 200.
    ///
    /// Upstream "very unhealthy" and "hazardous" bands both land here,
    /// since accessories only expose five categories.
    Poor = 5,
}

impl AirQuality {
    /// Classify a provider AQI value. Equivalent to [`classify`].
    #[must_use]
    pub fn from_aqi(aqi: f64) -> Self {
        classify(Some(aqi))
    }
}

impl From<u8> for AirQuality {
    fn from(value: u8) -> Self {
        match value {
            1 => AirQuality::Excellent,
            2 => AirQuality::Good,
            3 => AirQuality::Fair,
            4 => AirQuality::Inferior,
            5 => AirQuality::Poor,
            _ => AirQuality::Unknown,
        }
    }
}

impl fmt::Display for AirQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirQuality::Unknown => write!(f, "Unknown"),
            AirQuality::Excellent => write!(f, "Excellent"),
            AirQuality::Good => write!(f, "Good"),
            AirQuality::Fair => write!(f, "Fair"),
            AirQuality::Inferior => write!(f, "Inferior"),
            AirQuality::Poor => write!(f, "Poor"),
        }
    }
}

/// Map a numeric AQI onto an [`AirQuality`] category.
///
/// Total over its input: `None`, negative values and NaN are [`AirQuality::Unknown`].
///
/// ```
/// use airsense_types::{AirQuality, classify};
///
/// assert_eq!(classify(None), AirQuality::Unknown);
/// assert_eq!(classify(Some(50.0)), AirQuality::Excellent);
/// assert_eq!(classify(Some(51.0)), AirQuality::Good);
/// assert_eq!(classify(Some(201.0)), AirQuality::Poor);
/// ```
#[must_use]
pub fn classify(aqi: Option<f64>) -> AirQuality {
    match aqi {
        Some(aqi) if aqi.is_nan() || aqi < 0.0 => AirQuality::Unknown,
        None => AirQuality::Unknown,
        Some(aqi) if aqi <= 50.0 => AirQuality::Excellent,
        Some(aqi) if aqi <= 100.0 => AirQuality::Good,
        Some(aqi) if aqi <= 150.0 => AirQuality::Fair,
        Some(aqi) if aqi <= 200.0 => AirQuality::Inferior,
        Some(_) => AirQuality::Poor,
    }
}

/// Fault state of a sensor accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum StatusFault {
    /// The last refresh succeeded.
    #[default]
    NoFault = 0,
    /// The last refresh failed.
    GeneralFault = 1,
}

impl fmt::Display for StatusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFault::NoFault => write!(f, "No Fault"),
            StatusFault::GeneralFault => write!(f, "General Fault"),
        }
    }
}

/// A pollutant tracked by a [`SensorReading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pollutant {
    Ozone,
    NitrogenDioxide,
    SulphurDioxide,
    Pm2_5,
    Pm10,
    CarbonMonoxide,
}

impl Pollutant {
    /// Every tracked pollutant, in characteristic order.
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Ozone,
        Pollutant::NitrogenDioxide,
        Pollutant::SulphurDioxide,
        Pollutant::Pm2_5,
        Pollutant::Pm10,
        Pollutant::CarbonMonoxide,
    ];

    /// Look up a pollutant by its AirNow `ParameterName`.
    ///
    /// Matching is case-sensitive; AirNow only reports these three.
    ///
    /// ```
    /// use airsense_types::Pollutant;
    ///
    /// assert_eq!(Pollutant::from_airnow_parameter("PM2.5"), Some(Pollutant::Pm2_5));
    /// assert_eq!(Pollutant::from_airnow_parameter("pm2.5"), None);
    /// ```
    #[must_use]
    pub fn from_airnow_parameter(name: &str) -> Option<Self> {
        match name {
            "O3" => Some(Pollutant::Ozone),
            "PM2.5" => Some(Pollutant::Pm2_5),
            "PM10" => Some(Pollutant::Pm10),
            _ => None,
        }
    }

    /// Look up a pollutant by its WAQI `iaqi` key.
    #[must_use]
    pub fn from_aqicn_code(code: &str) -> Option<Self> {
        match code {
            "o3" => Some(Pollutant::Ozone),
            "no2" => Some(Pollutant::NitrogenDioxide),
            "so2" => Some(Pollutant::SulphurDioxide),
            "pm25" => Some(Pollutant::Pm2_5),
            "pm10" => Some(Pollutant::Pm10),
            "co" => Some(Pollutant::CarbonMonoxide),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pollutant::Ozone => write!(f, "O3"),
            Pollutant::NitrogenDioxide => write!(f, "NO2"),
            Pollutant::SulphurDioxide => write!(f, "SO2"),
            Pollutant::Pm2_5 => write!(f, "PM2.5"),
            Pollutant::Pm10 => write!(f, "PM10"),
            Pollutant::CarbonMonoxide => write!(f, "CO"),
        }
    }
}

/// Upstream air quality data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Provider {
    /// AirNow (zip code or lat/long lookup, flat array response).
    AirNow,
    /// World Air Quality Index project (named location, nested object response).
    Aqicn,
    /// A provider name this crate does not recognize.
    Unknown(String),
}

impl Provider {
    /// Resolve a configured provider name (case-insensitive).
    ///
    /// ```
    /// use airsense_types::Provider;
    ///
    /// assert_eq!(Provider::from_name("airnow"), Provider::AirNow);
    /// assert_eq!(Provider::from_name("AQICN"), Provider::Aqicn);
    /// assert_eq!(Provider::from_name("purple"), Provider::Unknown("purple".into()));
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "airnow" => Provider::AirNow,
            "aqicn" => Provider::Aqicn,
            _ => Provider::Unknown(name.to_string()),
        }
    }

    /// Model name shown on the accessory information service.
    #[must_use]
    pub fn model(&self) -> &'static str {
        match self {
            Provider::AirNow => "AirNow",
            Provider::Aqicn => "Aqicn",
            Provider::Unknown(_) => "Unknown",
        }
    }

    /// Whether this provider can be queried.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Provider::Unknown(_))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::AirNow => write!(f, "airnow"),
            Provider::Aqicn => write!(f, "aqicn"),
            Provider::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// The published state of one air quality sensor.
///
/// Densities are non-negative and default to 0. A fresh reading starts at
/// [`AirQuality::Excellent`] with no fault, matching how accessories are
/// initialized before their first refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SensorReading {
    /// Derived category; only ever set from a classified AQI.
    pub air_quality: AirQuality,
    pub ozone_density: f64,
    pub nitrogen_dioxide_density: f64,
    pub sulphur_dioxide_density: f64,
    pub pm2_5_density: f64,
    pub pm10_density: f64,
    pub carbon_monoxide_level: f64,
    pub status_fault: StatusFault,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            air_quality: AirQuality::Excellent,
            ozone_density: 0.0,
            nitrogen_dioxide_density: 0.0,
            sulphur_dioxide_density: 0.0,
            pm2_5_density: 0.0,
            pm10_density: 0.0,
            carbon_monoxide_level: 0.0,
            status_fault: StatusFault::NoFault,
        }
    }
}

impl SensorReading {
    /// Value currently held for `pollutant`.
    #[must_use]
    pub fn get(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Ozone => self.ozone_density,
            Pollutant::NitrogenDioxide => self.nitrogen_dioxide_density,
            Pollutant::SulphurDioxide => self.sulphur_dioxide_density,
            Pollutant::Pm2_5 => self.pm2_5_density,
            Pollutant::Pm10 => self.pm10_density,
            Pollutant::CarbonMonoxide => self.carbon_monoxide_level,
        }
    }

    /// Overwrite the value for `pollutant`. Negative input is clamped to 0.
    pub fn set(&mut self, pollutant: Pollutant, value: f64) {
        let value = value.max(0.0);
        let slot = match pollutant {
            Pollutant::Ozone => &mut self.ozone_density,
            Pollutant::NitrogenDioxide => &mut self.nitrogen_dioxide_density,
            Pollutant::SulphurDioxide => &mut self.sulphur_dioxide_density,
            Pollutant::Pm2_5 => &mut self.pm2_5_density,
            Pollutant::Pm10 => &mut self.pm10_density,
            Pollutant::CarbonMonoxide => &mut self.carbon_monoxide_level,
        };
        *slot = value;
    }

    /// Copy of this reading with [`StatusFault::GeneralFault`] set.
    #[must_use]
    pub fn with_fault(mut self) -> Self {
        self.status_fault = StatusFault::GeneralFault;
        self
    }

    /// Whether the reading is currently faulted.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.status_fault == StatusFault::GeneralFault
    }
}
