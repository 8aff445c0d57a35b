//! Service configuration.
//!
//! Per-sensor settings fall back to the platform `[options]` table and then
//! to built-in defaults. [`DeviceConfig::resolve`] applies that order once
//! at startup and records which tier each value came from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use airsense_core::provider::{AIRNOW_URL, AQICN_URL, DEFAULT_DISTANCE, Endpoints};
use airsense_core::refresh::{DEFAULT_REFRESH_RATE, Logging};
use airsense_core::{Location, Provider, ProviderQuery};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platform-wide defaults.
    pub options: PlatformOptions,
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Upstream HTTP settings.
    pub http: HttpConfig,
    /// Sensors to publish.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every error found.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Storage path is not empty
    /// - HTTP timeout is non-zero and base URLs parse
    /// - Refresh rates are non-zero
    /// - Coordinates are in range
    /// - No two sensors resolve to the same provider and location
    ///
    /// An unrecognized provider is not an error here; that sensor starts
    /// and reports a fault on every cycle.
    ///
    /// # Example
    ///
    /// ```
    /// use airsense_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.options.validate());
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.http.validate());

        let mut seen = std::collections::HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            let prefix = format!("devices[{}]", i);
            errors.extend(device.validate(&prefix));

            let resolved = device.resolve(&self.options);
            if !resolved.delete && !seen.insert(resolved.identity()) {
                errors.push(ValidationError {
                    field: prefix,
                    message: format!("duplicate sensor '{}'", resolved.query),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Problems that do not stop the service but will likely make a sensor
    /// fault: a missing API key, half of a place or half of a coordinate
    /// pair.
    pub fn warnings(&self) -> Vec<String> {
        if self.devices.is_empty() {
            return vec!["no devices configured".to_string()];
        }

        let mut warnings = Vec::new();
        for (i, device) in self.devices.iter().enumerate() {
            let label = device.label(i);
            if device.api_key.is_none() && self.options.api_key.is_none() {
                warnings.push(format!("{label}: missing API key"));
            }
            if device.provider.is_none() && self.options.provider.is_none() {
                warnings.push(format!("{label}: missing provider"));
            }
            if let Some(missing) = half_pair(&device.zip_code, "zip code", &device.city, "city") {
                warnings.push(format!("{label}: missing {missing}"));
            }
            if let Some(missing) =
                half_pair(&device.latitude, "latitude", &device.longitude, "longitude")
            {
                warnings.push(format!("{label}: missing {missing}"));
            }
        }
        warnings
    }
}

/// Name the missing half when exactly one of a pair is set.
fn half_pair<A, B>(
    a: &Option<A>,
    a_name: &'static str,
    b: &Option<B>,
    b_name: &'static str,
) -> Option<&'static str> {
    match (a.is_some(), b.is_some()) {
        (true, false) => Some(b_name),
        (false, true) => Some(a_name),
        _ => None,
    }
}

/// Platform defaults, used by any device that leaves a setting unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformOptions {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    /// AirNow search radius in miles.
    pub distance: Option<u32>,
    /// Seconds between refreshes.
    pub refresh_rate: Option<u64>,
    pub logging: Option<Logging>,
    /// Keep display names as configured instead of stripping characters
    /// accessory frameworks reject.
    pub allow_invalid_characters: bool,
}

impl PlatformOptions {
    /// Validate platform options.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.refresh_rate == Some(0) {
            errors.push(ValidationError {
                field: "options.refresh_rate".to_string(),
                message: "refresh rate must be at least 1 second".to_string(),
            });
        }
        errors
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
            return errors;
        }

        let Some((_, port)) = self.bind.rsplit_once(':') else {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            });
            return errors;
        };

        match port.parse::<u16>() {
            Ok(0) => errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "port cannot be 0".to_string(),
            }),
            Err(_) => errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!("invalid port '{}': must be a number 1-65535", port),
            }),
            Ok(_) => {}
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Accessory cache file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: crate::cache::default_cache_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "cache path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Upstream HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// AirNow observation API base URL.
    pub airnow_url: String,
    /// World Air Quality Index feed base URL.
    pub aqicn_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            airnow_url: AIRNOW_URL.to_string(),
            aqicn_url: AQICN_URL.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            airnow: self.airnow_url.clone(),
            aqicn: self.aqicn_url.clone(),
        }
    }

    /// Validate HTTP configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.timeout == 0 {
            errors.push(ValidationError {
                field: "http.timeout".to_string(),
                message: "timeout must be at least 1 second".to_string(),
            });
        }
        for (field, url) in [
            ("http.airnow_url", &self.airnow_url),
            ("http.aqicn_url", &self.aqicn_url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("invalid URL '{}': {}", url, e),
                });
            }
        }

        errors
    }
}

/// Configuration for one air quality sensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `airnow` or `aqicn` (case-insensitive).
    pub provider: Option<String>,
    pub api_key: Option<String>,
    /// AirNow lookup by zip code.
    pub zip_code: Option<String>,
    /// Aqicn lookup by city or station name; also the display name.
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// AirNow search radius in miles.
    pub distance: Option<u32>,
    /// Seconds between refreshes.
    pub refresh_rate: Option<u64>,
    pub logging: Option<Logging>,
    /// Remove this sensor from the accessory cache instead of starting it.
    pub delete: bool,
    /// Firmware revision shown on the accessory.
    pub firmware: Option<String>,
}

impl DeviceConfig {
    /// Validate device configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.refresh_rate == Some(0) {
            errors.push(ValidationError {
                field: format!("{}.refresh_rate", prefix),
                message: "refresh rate must be at least 1 second".to_string(),
            });
        }

        if let Some(latitude) = self.latitude
            && !(-90.0..=90.0).contains(&latitude)
        {
            errors.push(ValidationError {
                field: format!("{}.latitude", prefix),
                message: format!("latitude {} is out of range (-90 to 90)", latitude),
            });
        }
        if let Some(longitude) = self.longitude
            && !(-180.0..=180.0).contains(&longitude)
        {
            errors.push(ValidationError {
                field: format!("{}.longitude", prefix),
                message: format!("longitude {} is out of range (-180 to 180)", longitude),
            });
        }

        let has_coordinates = self.latitude.is_some() && self.longitude.is_some();
        if self.zip_code.is_none() && self.city.is_none() && !has_coordinates {
            errors.push(ValidationError {
                field: prefix.to_string(),
                message: "a zip code, city, or latitude and longitude is required".to_string(),
            });
        }

        errors
    }

    /// Apply the device, platform, default order to every tiered setting.
    pub fn resolve(&self, options: &PlatformOptions) -> ResolvedDevice {
        let provider = tier(self.provider.clone(), options.provider.clone(), "unknown".to_string());
        let api_key = tier(self.api_key.clone(), options.api_key.clone(), String::new());
        let distance = tier(self.distance, options.distance, DEFAULT_DISTANCE);
        let refresh_rate = tier(self.refresh_rate, options.refresh_rate, DEFAULT_REFRESH_RATE);
        let logging = tier(self.logging, options.logging, Logging::default());

        let location = Location::from_parts(
            self.zip_code.as_deref(),
            self.city.as_deref(),
            self.latitude,
            self.longitude,
        );
        let query =
            ProviderQuery::new(Provider::from_name(&provider.value), location, api_key.value)
                .with_distance(distance.value);

        ResolvedDevice {
            name: self
                .city
                .clone()
                .filter(|city| !city.is_empty())
                .unwrap_or_else(|| query.location().to_string()),
            serial_number: self.zip_code.clone().unwrap_or_else(|| "00000".to_string()),
            firmware: self.firmware.clone(),
            delete: self.delete,
            query,
            provider_source: provider.source,
            api_key_source: api_key.source,
            distance_source: distance.source,
            refresh_rate,
            logging,
        }
    }

    /// Human label for log lines before the device is resolved.
    fn label(&self, index: usize) -> String {
        self.city
            .clone()
            .or_else(|| self.zip_code.clone())
            .unwrap_or_else(|| format!("devices[{}]", index))
    }
}

/// Which configuration tier a setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Device,
    Platform,
    Default,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Device => write!(f, "Device Config"),
            Source::Platform => write!(f, "Platform Config"),
            Source::Default => write!(f, "Default"),
        }
    }
}

/// A resolved setting and the tier it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tiered<T> {
    pub value: T,
    pub source: Source,
}

fn tier<T>(device: Option<T>, platform: Option<T>, default: T) -> Tiered<T> {
    match (device, platform) {
        (Some(value), _) => Tiered {
            value,
            source: Source::Device,
        },
        (None, Some(value)) => Tiered {
            value,
            source: Source::Platform,
        },
        (None, None) => Tiered {
            value: default,
            source: Source::Default,
        },
    }
}

/// A device with every setting resolved.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    /// Display name before cleaning.
    pub name: String,
    pub serial_number: String,
    pub firmware: Option<String>,
    pub delete: bool,
    pub query: ProviderQuery,
    pub provider_source: Source,
    pub api_key_source: Source,
    pub distance_source: Source,
    pub refresh_rate: Tiered<u64>,
    pub logging: Tiered<Logging>,
}

impl ResolvedDevice {
    /// Provider and location, the inputs of the sensor id.
    ///
    /// Coordinates identify by `<lat><lon><provider>`, places by
    /// `<zip><city><provider>`, with unset parts as `00000` and `Unknown`.
    pub fn identity(&self) -> String {
        let provider = self.query.provider();
        match self.query.location() {
            Location::Coordinates {
                latitude,
                longitude,
            } => format!("{latitude}{longitude}{provider}"),
            Location::Place { zip_code, city } => {
                let zip_code = if zip_code.is_empty() { "00000" } else { zip_code };
                let city = if city.is_empty() { "Unknown" } else { city };
                format!("{zip_code}{city}{provider}")
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_rate.value)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `devices[0].latitude`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airsense")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seattle() -> DeviceConfig {
        DeviceConfig {
            provider: Some("airnow".to_string()),
            api_key: Some("KEY".to_string()),
            zip_code: Some("98101".to_string()),
            city: Some("Seattle".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.http.timeout, 30);
        assert_eq!(config.http.endpoints(), Endpoints::default());
        assert!(config.devices.is_empty());
        assert!(!config.options.allow_invalid_characters);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("airsense/config.toml"));
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [options]
            api_key = "PLATFORM"
            refresh_rate = 1800
            logging = "debug"

            [server]
            bind = "0.0.0.0:9090"

            [http]
            timeout = 10

            [[devices]]
            provider = "airnow"
            zip_code = "98101"
            city = "Seattle"
            distance = 50

            [[devices]]
            provider = "AQICN"
            city = "Beijing"
            api_key = "TOKEN"
            refresh_rate = 600
            logging = "none"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
        assert_eq!(config.http.aqicn_url, AQICN_URL);
        assert_eq!(config.options.logging, Some(Logging::Debug));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].distance, Some(50));
        assert_eq!(config.devices[1].logging, Some(Logging::None));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.path = PathBuf::from("/tmp/accessories.json");
        config.devices.push(seattle());

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/accessories.json"));
        assert_eq!(loaded.devices.len(), 1);
        assert_eq!(loaded.devices[0].zip_code.as_deref(), Some("98101"));
        assert_eq!(loaded.devices[0].city.as_deref(), Some("Seattle"));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_validated_rejects_zero_refresh() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[[devices]]\ncity = \"Paris\"\nrefresh_rate = 0\n").unwrap();

        let result = Config::load_validated(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // --- resolution ---

    #[test]
    fn test_resolve_device_wins() {
        let options = PlatformOptions {
            refresh_rate: Some(1800),
            api_key: Some("PLATFORM".to_string()),
            ..Default::default()
        };
        let device = DeviceConfig {
            refresh_rate: Some(600),
            ..seattle()
        };
        let resolved = device.resolve(&options);
        assert_eq!(resolved.refresh_rate, Tiered { value: 600, source: Source::Device });
        assert_eq!(resolved.api_key_source, Source::Device);
        assert_eq!(resolved.refresh_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_resolve_platform_then_default() {
        let options = PlatformOptions {
            refresh_rate: Some(1800),
            logging: Some(Logging::Debug),
            ..Default::default()
        };
        let resolved = seattle().resolve(&options);
        assert_eq!(resolved.refresh_rate, Tiered { value: 1800, source: Source::Platform });
        assert_eq!(resolved.logging, Tiered { value: Logging::Debug, source: Source::Platform });
        assert_eq!(resolved.distance_source, Source::Default);
        assert_eq!(resolved.query.distance(), DEFAULT_DISTANCE);

        let resolved = seattle().resolve(&PlatformOptions::default());
        assert_eq!(
            resolved.refresh_rate,
            Tiered {
                value: DEFAULT_REFRESH_RATE,
                source: Source::Default
            }
        );
        assert_eq!(resolved.logging.value, Logging::Standard);
    }

    #[test]
    fn test_resolve_provider() {
        let resolved = seattle().resolve(&PlatformOptions::default());
        assert_eq!(resolved.query.provider(), &Provider::AirNow);

        let device = DeviceConfig {
            provider: None,
            ..seattle()
        };
        let options = PlatformOptions {
            provider: Some("Aqicn".to_string()),
            ..Default::default()
        };
        let resolved = device.resolve(&options);
        assert_eq!(resolved.query.provider(), &Provider::Aqicn);
        assert_eq!(resolved.provider_source, Source::Platform);

        let resolved = device.resolve(&PlatformOptions::default());
        assert!(!resolved.query.provider().is_known());
        assert_eq!(resolved.provider_source, Source::Default);
    }

    #[test]
    fn test_resolve_location_and_identity() {
        let resolved = seattle().resolve(&PlatformOptions::default());
        assert_eq!(resolved.query.location(), &Location::place("98101", "Seattle"));
        assert_eq!(resolved.identity(), "98101Seattleairnow");
        assert_eq!(resolved.name, "Seattle");
        assert_eq!(resolved.serial_number, "98101");

        let device = DeviceConfig {
            provider: Some("aqicn".to_string()),
            latitude: Some(47.60621234),
            longitude: Some(-122.33207),
            ..Default::default()
        };
        let resolved = device.resolve(&PlatformOptions::default());
        assert_eq!(resolved.query.location(), &Location::coordinates(47.606212, -122.33207));
        assert_eq!(resolved.identity(), "47.606212-122.33207aqicn");
        assert_eq!(resolved.name, "47.606212,-122.33207");
        assert_eq!(resolved.serial_number, "00000");

        let device = DeviceConfig {
            provider: Some("airnow".to_string()),
            zip_code: Some("10001".to_string()),
            ..Default::default()
        };
        let resolved = device.resolve(&PlatformOptions::default());
        assert_eq!(resolved.identity(), "10001Unknownairnow");
        assert_eq!(resolved.name, "10001");
    }

    // --- validation ---

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        let valid = ServerConfig {
            bind: "[::1]:8080".to_string(),
        };
        assert!(valid.validate().is_empty());

        let no_port = ServerConfig {
            bind: "127.0.0.1".to_string(),
        };
        let errors = no_port.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let port_zero = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        };
        assert!(port_zero.validate()[0].message.contains("cannot be 0"));

        let bad_port = ServerConfig {
            bind: "127.0.0.1:abc".to_string(),
        };
        assert!(bad_port.validate()[0].message.contains("must be a number"));
    }

    #[test]
    fn test_http_validation() {
        let http = HttpConfig {
            timeout: 0,
            airnow_url: "not a url".to_string(),
            ..Default::default()
        };
        let errors = http.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "http.timeout"));
        assert!(errors.iter().any(|e| e.field == "http.airnow_url"));
    }

    #[test]
    fn test_device_validation() {
        assert!(seattle().validate("devices[0]").is_empty());

        let zero = DeviceConfig {
            refresh_rate: Some(0),
            ..seattle()
        };
        let errors = zero.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "devices[0].refresh_rate");

        // Any non-zero rate is accepted, however short.
        let fast = DeviceConfig {
            refresh_rate: Some(1),
            ..seattle()
        };
        assert!(fast.validate("devices[0]").is_empty());

        let out_of_range = DeviceConfig {
            latitude: Some(91.0),
            longitude: Some(-181.0),
            ..seattle()
        };
        assert_eq!(out_of_range.validate("devices[0]").len(), 2);

        let nowhere = DeviceConfig {
            provider: Some("airnow".to_string()),
            latitude: Some(47.6),
            ..Default::default()
        };
        let errors = nowhere.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("required"));
    }

    #[test]
    fn test_duplicate_sensors() {
        let mut config = Config::default();
        config.devices.push(seattle());
        config.devices.push(DeviceConfig {
            provider: Some("AirNow".to_string()),
            refresh_rate: Some(60),
            ..seattle()
        });

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected duplicate error");
        };
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));

        // A device marked for deletion does not count.
        config.devices[1].delete = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warnings() {
        assert_eq!(Config::default().warnings(), vec!["no devices configured"]);

        let mut config = Config::default();
        config.devices.push(DeviceConfig {
            city: Some("Paris".to_string()),
            latitude: Some(48.85),
            ..Default::default()
        });
        let warnings = config.warnings();
        assert!(warnings.contains(&"Paris: missing API key".to_string()));
        assert!(warnings.contains(&"Paris: missing provider".to_string()));
        assert!(warnings.contains(&"Paris: missing zip code".to_string()));
        assert!(warnings.contains(&"Paris: missing longitude".to_string()));

        config.options.api_key = Some("KEY".to_string());
        config.options.provider = Some("aqicn".to_string());
        assert_eq!(config.warnings().len(), 2);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Device.to_string(), "Device Config");
        assert_eq!(Source::Platform.to_string(), "Platform Config");
        assert_eq!(Source::Default.to_string(), "Default");
    }

    #[test]
    fn test_config_validation_error_display() {
        let error = ConfigError::Validation(vec![
            ValidationError {
                field: "server.bind".to_string(),
                message: "port cannot be 0".to_string(),
            },
            ValidationError {
                field: "devices[0].refresh_rate".to_string(),
                message: "refresh rate must be at least 1 second".to_string(),
            },
        ]);
        let display = format!("{}", error);
        assert!(display.contains("server.bind"));
        assert!(display.contains("devices[0].refresh_rate"));
    }
}
