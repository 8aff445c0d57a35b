//! Provider queries and request URLs.
//!
//! A [`ProviderQuery`] is built once per sensor from its resolved
//! configuration and never changes afterwards. Each refresh cycle asks it
//! for the request URL.
//!
//! ```
//! use airsense_core::provider::{Endpoints, Location, ProviderQuery};
//! use airsense_types::Provider;
//!
//! let query = ProviderQuery::new(
//!     Provider::Aqicn,
//!     Location::place("", "Seattle"),
//!     "token",
//! );
//! let url = query.url(&Endpoints::default()).unwrap();
//! assert_eq!(url.as_str(), "http://api.waqi.info/feed/Seattle/?token=token");
//! ```

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use airsense_types::Provider;

use crate::error::{Error, Result};

/// AirNow observation API base URL.
pub const AIRNOW_URL: &str = "https://www.airnowapi.org/aq/observation/";
/// World Air Quality Index feed API base URL.
pub const AQICN_URL: &str = "http://api.waqi.info/feed/";

/// Default AirNow search radius in miles.
pub const DEFAULT_DISTANCE: u32 = 25;

/// Base URLs for each provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub airnow: String,
    pub aqicn: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            airnow: AIRNOW_URL.to_string(),
            aqicn: AQICN_URL.to_string(),
        }
    }
}

/// Where a sensor looks for observations.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// Zip code (AirNow) or city / station name (Aqicn).
    Place { zip_code: String, city: String },
    /// Latitude and longitude, rounded to 6 decimal places.
    Coordinates { latitude: f64, longitude: f64 },
}

impl Location {
    /// A named place.
    pub fn place(zip_code: impl Into<String>, city: impl Into<String>) -> Self {
        Self::Place {
            zip_code: zip_code.into(),
            city: city.into(),
        }
    }

    /// A coordinate pair, rounded to 6 decimal places.
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self::Coordinates {
            latitude: round6(latitude),
            longitude: round6(longitude),
        }
    }

    /// Pick the active form: coordinates when both are present, the place otherwise.
    pub fn from_parts(
        zip_code: Option<&str>,
        city: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Self::coordinates(latitude, longitude),
            _ => Self::place(zip_code.unwrap_or_default(), city.unwrap_or_default()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Place { zip_code, city } if city.is_empty() => write!(f, "{zip_code}"),
            Location::Place { city, .. } => write!(f, "{city}"),
            Location::Coordinates {
                latitude,
                longitude,
            } => write!(f, "{latitude},{longitude}"),
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Everything needed to ask one provider about one location.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuery {
    provider: Provider,
    location: Location,
    api_key: String,
    distance: u32,
}

impl ProviderQuery {
    /// Create a query with the default AirNow search radius.
    pub fn new(provider: Provider, location: Location, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            location,
            api_key: api_key.into(),
            distance: DEFAULT_DISTANCE,
        }
    }

    /// Set the AirNow search radius in miles. Ignored by Aqicn.
    #[must_use]
    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = distance;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    /// Build the request URL for this query.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProvider`] when the provider is not recognized, and
    /// [`Error::InvalidUrl`] when a configured base URL cannot be used.
    pub fn url(&self, endpoints: &Endpoints) -> Result<Url> {
        match &self.provider {
            Provider::AirNow => self.airnow_url(&endpoints.airnow),
            Provider::Aqicn => self.aqicn_url(&endpoints.aqicn),
            Provider::Unknown(name) => Err(Error::UnknownProvider(name.clone())),
        }
    }

    fn airnow_url(&self, base: &str) -> Result<Url> {
        let lookup = match self.location {
            Location::Place { .. } => "zipCode/current/",
            Location::Coordinates { .. } => "latLong/current/",
        };
        let mut url = base_url(base)?
            .join(lookup)
            .map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "application/json");
            match &self.location {
                Location::Place { zip_code, .. } => {
                    query.append_pair("zipCode", zip_code);
                }
                Location::Coordinates {
                    latitude,
                    longitude,
                } => {
                    query.append_pair("latitude", &latitude.to_string());
                    query.append_pair("longitude", &longitude.to_string());
                }
            }
            query.append_pair("distance", &self.distance.to_string());
            query.append_pair("API_KEY", &self.api_key);
        }
        Ok(url)
    }

    fn aqicn_url(&self, base: &str) -> Result<Url> {
        let station = match &self.location {
            Location::Place { city, .. } if city.is_empty() => UNKNOWN_STATION.to_string(),
            Location::Place { city, .. } => city.clone(),
            Location::Coordinates {
                latitude,
                longitude,
            } => format!("geo:{latitude};{longitude}"),
        };
        let mut url = base_url(base)?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("{base}: cannot be a base")))?
            .pop_if_empty()
            .push(&station)
            .push("");
        url.query_pairs_mut().append_pair("token", &self.api_key);
        Ok(url)
    }
}

impl fmt::Display for ProviderQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.provider, self.location)
    }
}

/// Station requested from Aqicn for a place with no city.
const UNKNOWN_STATION: &str = "Unknown";

/// Parse a base URL, making sure it ends with a slash so joins append.
fn base_url(base: &str) -> Result<Url> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&normalized).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_prefers_coordinates() {
        let location =
            Location::from_parts(Some("98101"), Some("Seattle"), Some(47.6), Some(-122.3));
        assert!(matches!(location, Location::Coordinates { .. }));
    }

    #[test]
    fn test_location_half_coordinates_falls_back_to_place() {
        let location = Location::from_parts(Some("98101"), Some("Seattle"), Some(47.6), None);
        assert_eq!(location, Location::place("98101", "Seattle"));
    }

    #[test]
    fn test_coordinates_rounded() {
        let location = Location::coordinates(47.606209123, -122.332071987);
        assert_eq!(
            location,
            Location::Coordinates {
                latitude: 47.606209,
                longitude: -122.332072
            }
        );
    }

    #[test]
    fn test_airnow_zip_url() {
        let query =
            ProviderQuery::new(Provider::AirNow, Location::place("98101", "Seattle"), "KEY")
                .with_distance(10);
        let url = query.url(&Endpoints::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.airnowapi.org/aq/observation/zipCode/current/\
             ?format=application%2Fjson&zipCode=98101&distance=10&API_KEY=KEY"
        );
    }

    #[test]
    fn test_airnow_lat_long_url() {
        let query =
            ProviderQuery::new(Provider::AirNow, Location::coordinates(47.5, -122.25), "KEY");
        let url = query.url(&Endpoints::default()).unwrap();
        assert_eq!(url.path(), "/aq/observation/latLong/current/");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("latitude".into(), "47.5".into())));
        assert!(pairs.contains(&("longitude".into(), "-122.25".into())));
        assert!(pairs.contains(&("distance".into(), DEFAULT_DISTANCE.to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "zipCode"));
    }

    #[test]
    fn test_aqicn_city_url_is_escaped() {
        let query = ProviderQuery::new(Provider::Aqicn, Location::place("", "Los Angeles"), "t0k");
        let url = query.url(&Endpoints::default()).unwrap();
        assert_eq!(url.as_str(), "http://api.waqi.info/feed/Los%20Angeles/?token=t0k");
    }

    #[test]
    fn test_aqicn_without_city_asks_for_unknown_station() {
        let query = ProviderQuery::new(Provider::Aqicn, Location::place("98101", ""), "t");
        let url = query.url(&Endpoints::default()).unwrap();
        assert_eq!(url.as_str(), "http://api.waqi.info/feed/Unknown/?token=t");
    }

    #[test]
    fn test_aqicn_geo_url() {
        let query = ProviderQuery::new(Provider::Aqicn, Location::coordinates(10.5, -20.25), "t");
        let url = query.url(&Endpoints::default()).unwrap();
        assert_eq!(url.as_str(), "http://api.waqi.info/feed/geo:10.5;-20.25/?token=t");
    }

    #[test]
    fn test_unknown_provider_has_no_url() {
        let query = ProviderQuery::new(
            Provider::from_name("purpleair"),
            Location::place("98101", ""),
            "KEY",
        );
        let err = query.url(&Endpoints::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(name) if name == "purpleair"));
    }

    #[test]
    fn test_custom_endpoint_without_trailing_slash() {
        let endpoints = Endpoints {
            aqicn: "http://127.0.0.1:9000/feed".to_string(),
            ..Endpoints::default()
        };
        let query = ProviderQuery::new(Provider::Aqicn, Location::place("", "Paris"), "t");
        let url = query.url(&endpoints).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/feed/Paris/?token=t");
    }

    #[test]
    fn test_invalid_endpoint() {
        let endpoints = Endpoints {
            airnow: "not a url".to_string(),
            ..Endpoints::default()
        };
        let query = ProviderQuery::new(Provider::AirNow, Location::place("98101", ""), "KEY");
        assert!(matches!(query.url(&endpoints), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_query_display() {
        let query = ProviderQuery::new(Provider::Aqicn, Location::place("", "Paris"), "t");
        assert_eq!(query.to_string(), "aqicn @ Paris");
        let query = ProviderQuery::new(Provider::AirNow, Location::place("98101", ""), "t");
        assert_eq!(query.to_string(), "airnow @ 98101");
    }
}
