//! Accessory registry.
//!
//! Turns resolved device configuration into running sensors: derives each
//! sensor's id, restores its cached reading, cleans its display name and
//! removes the cache entries of devices marked `delete`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use airsense_core::{Fetcher, SensorAccessory, SensorRefresher};

use crate::cache::CacheError;
use crate::config::ResolvedDevice;
use crate::state::{AccessoryInfo, AppState, SensorHandle};

/// Namespace for sensor ids.
const SENSOR_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_3a52_8c0e_4b7a_9f21_5e4c_a8d3_07b6);

/// Deterministic id of the sensor a device resolves to.
///
/// The same provider and location always map to the same id, so a restarted
/// service finds its cached accessory.
pub fn sensor_id(device: &ResolvedDevice) -> Uuid {
    Uuid::new_v5(&SENSOR_NAMESPACE, device.identity().as_bytes())
}

/// Reduce a display name to what accessory frameworks accept: letters,
/// digits, spaces and apostrophes, starting and ending with a letter or
/// digit.
///
/// Names that already qualify, and every name when `allow_invalid` is set,
/// are returned unchanged.
pub fn clean_display_name(name: &str, allow_invalid: bool) -> String {
    if allow_invalid || is_valid_name(name) {
        return name.to_string();
    }

    warn!(
        "The accessory '{}' has an invalid name. Use only alphanumeric, space, and apostrophe \
         characters, starting and ending with a letter or digit",
        name
    );

    let stripped: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '\'')
        .collect();
    if stripped != name {
        warn!("Removing invalid characters from name: '{}' -> '{}'", name, stripped);
    }

    let trimmed = stripped.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed != stripped {
        warn!(
            "Removing invalid starting or ending characters from name: '{}' -> '{}'",
            stripped, trimmed
        );
    }

    trimmed.to_string()
}

fn is_valid_name(name: &str) -> bool {
    let (Some(first), Some(last)) = (name.chars().next(), name.chars().next_back()) else {
        return false;
    };
    name.chars().count() >= 2
        && first.is_alphanumeric()
        && last.is_alphanumeric()
        && name.chars().all(|c| c.is_alphanumeric() || c == ' ' || c == '\'')
}

/// Normalize a firmware string into a dotted revision.
///
/// A leading `V` and any `-suffix` are dropped; a version without dots has
/// one inserted between each character.
///
/// ```
/// use airsense_service::registry::normalize_firmware;
///
/// assert_eq!(normalize_firmware("V1.2.3-beta"), "1.2.3");
/// assert_eq!(normalize_firmware("123"), "1.2.3");
/// ```
pub fn normalize_firmware(version: &str) -> String {
    let version = version.strip_prefix('V').unwrap_or(version);
    let version = version.split('-').next().unwrap_or_default();

    let normalized = if version.contains('.') {
        version.to_string()
    } else {
        version
            .chars()
            .map(String::from)
            .collect::<Vec<_>>()
            .join(".")
    };

    if normalized.is_empty() {
        "0.0.0".to_string()
    } else {
        normalized
    }
}

/// Register every configured device with the state.
///
/// Devices marked `delete` are removed from the cache and not started. The
/// cache is saved if anything was removed. Returns the number of sensors
/// registered.
pub async fn register_sensors(
    state: &AppState,
    fetcher: Arc<dyn Fetcher>,
) -> Result<usize, CacheError> {
    let config = state.config.read().await.clone();
    let endpoints = config.http.endpoints();
    let mut cache = state.cache.lock().await;
    let mut sensors = Vec::new();
    let mut removed = 0;

    for device in &config.devices {
        let resolved = device.resolve(&config.options);
        let id = sensor_id(&resolved);

        if resolved.delete {
            if let Some(entry) = cache.remove(&id) {
                warn!("Removing existing accessory from cache: {}", entry.name);
                removed += 1;
            } else {
                debug!("Device {} is marked for deletion but is not cached", resolved.name);
            }
            continue;
        }

        let name = clean_display_name(&resolved.name, config.options.allow_invalid_characters);
        let context = cache.get(&id).map(|entry| entry.reading);
        if context.is_some() {
            info!("Restoring existing accessory from cache: {}", name);
        } else {
            info!("Adding new accessory: {}", name);
        }
        debug!("{} uuid: {} ({})", name, id, resolved.identity());
        debug!(
            "{}: provider from {}, API key from {}, distance from {}",
            name, resolved.provider_source, resolved.api_key_source, resolved.distance_source
        );
        debug!(
            "{}: Using {} Refresh Rate: {}",
            name, resolved.refresh_rate.source, resolved.refresh_rate.value
        );
        debug!("{}: Using {} Logging: {}", name, resolved.logging.source, resolved.logging.value);

        let firmware = normalize_firmware(
            resolved
                .firmware
                .as_deref()
                .unwrap_or(env!("CARGO_PKG_VERSION")),
        );
        debug!("{}: FirmwareRevision: {}", name, firmware);

        let accessory = Arc::new(SensorAccessory::restore(
            name.clone(),
            state.sink.clone(),
            context,
        ));
        let refresher =
            SensorRefresher::new(resolved.query.clone(), Arc::clone(&fetcher), accessory)
                .with_interval(resolved.refresh_interval())
                .with_logging(resolved.logging.value)
                .with_endpoints(endpoints.clone());

        sensors.push(Arc::new(SensorHandle {
            id,
            info: AccessoryInfo {
                name,
                model: resolved.query.provider().model().to_string(),
                serial_number: resolved.serial_number.clone(),
                firmware_revision: firmware,
            },
            refresher: Arc::new(refresher),
        }));
    }

    if removed > 0 {
        cache.save()?;
    }
    drop(cache);

    let count = sensors.len();
    *state.sensors.write().await = sensors;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AccessoryCache;
    use crate::config::{Config, DeviceConfig, PlatformOptions};
    use airsense_core::mock::MockFetcher;
    use airsense_core::{SensorReading, refresh::Logging};

    fn device(city: &str) -> DeviceConfig {
        DeviceConfig {
            provider: Some("aqicn".to_string()),
            api_key: Some("TOKEN".to_string()),
            city: Some(city.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sensor_id_is_stable() {
        let options = PlatformOptions::default();
        let a = sensor_id(&device("Seattle").resolve(&options));
        let b = sensor_id(&device("Seattle").resolve(&options));
        let c = sensor_id(&device("Portland").resolve(&options));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.get_version_num(), 5);

        // Refresh settings do not change identity.
        let tuned = DeviceConfig {
            refresh_rate: Some(60),
            logging: Some(Logging::Debug),
            ..device("Seattle")
        };
        assert_eq!(sensor_id(&tuned.resolve(&options)), a);
    }

    #[test]
    fn test_clean_display_name() {
        assert_eq!(clean_display_name("Seattle", false), "Seattle");
        assert_eq!(clean_display_name("St. John's", false), "St John's");
        assert_eq!(clean_display_name("-- Paris! --", false), "Paris");
        assert_eq!(clean_display_name("'Zürich'", false), "Zürich");
        assert_eq!(clean_display_name("Home 🏠", false), "Home");
        assert_eq!(clean_display_name("-- Paris! --", true), "-- Paris! --");
    }

    #[test]
    fn test_normalize_firmware() {
        assert_eq!(normalize_firmware("V1-beta"), "1");
        assert_eq!(normalize_firmware("123"), "1.2.3");
        assert_eq!(normalize_firmware("2.0.1"), "2.0.1");
        assert_eq!(normalize_firmware("V3.4"), "3.4");
        assert_eq!(normalize_firmware(""), "0.0.0");
        assert_eq!(normalize_firmware("V"), "0.0.0");
    }

    #[tokio::test]
    async fn test_register_restores_and_deletes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("accessories.json");

        let options = PlatformOptions::default();
        let kept_id = sensor_id(&device("Seattle").resolve(&options));
        let deleted_id = sensor_id(&device("Portland").resolve(&options));

        let mut saved = SensorReading::default();
        saved.pm2_5_density = 33.0;
        let mut cache = AccessoryCache::new(&path);
        cache.update(kept_id, "Seattle", saved);
        cache.update(deleted_id, "Portland", SensorReading::default());
        cache.save().unwrap();

        let mut config = Config::default();
        config.devices.push(DeviceConfig {
            firmware: Some("V2-rc1".to_string()),
            ..device("Seattle")
        });
        config.devices.push(DeviceConfig {
            delete: true,
            ..device("Portland")
        });
        config.devices.push(device("Tokyo!"));

        let state = AppState::new(config, AccessoryCache::open(&path).unwrap());
        let fetcher = Arc::new(MockFetcher::ok("{}"));
        let count = register_sensors(&state, fetcher).await.unwrap();
        assert_eq!(count, 2);

        let seattle = state.sensor(&kept_id).await.unwrap();
        assert_eq!(seattle.info.name, "Seattle");
        assert_eq!(seattle.info.model, "Aqicn");
        assert_eq!(seattle.info.serial_number, "00000");
        assert_eq!(seattle.info.firmware_revision, "2");
        assert_eq!(seattle.refresher.accessory().context().await.pm2_5_density, 33.0);

        let sensors = state.sensors.read().await;
        assert_eq!(sensors[1].info.name, "Tokyo");
        drop(sensors);

        let on_disk = AccessoryCache::open(&path).unwrap();
        assert!(on_disk.get(&deleted_id).is_none());
        assert!(on_disk.get(&kept_id).is_some());
    }
}
