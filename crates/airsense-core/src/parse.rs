//! Provider response decoding.
//!
//! Turns a raw response body into [`NormalizedReadings`]: the pollutant
//! values the response carried, in the order they were visited, plus the
//! category the pass produced.
//!
//! The two providers derive the category differently:
//!
//! - **AirNow** reports one combined observation per reporting area. The
//!   category is the classification of the highest AQI among *all* records,
//!   including parameters that are not tracked as pollutants.
//! - **Aqicn** reports each pollutant as an independent observation. Every
//!   tracked pollutant overwrites the category with its own classification,
//!   so the last one in the response's `iaqi` object (document order) wins.

use serde_json::{Map, Value};

use airsense_types::{AirQuality, Pollutant, Provider, classify};

use crate::error::ParseError;

/// Readings extracted from one provider response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedReadings {
    /// Pollutant values in the order they were read. Later entries win.
    pub values: Vec<(Pollutant, f64)>,
    /// Category produced by the pass, if any pollutant contributed one.
    pub category: Option<AirQuality>,
}

impl NormalizedReadings {
    /// Value reported for `pollutant`, if this response carried one.
    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.values
            .iter()
            .rev()
            .find(|(p, _)| *p == pollutant)
            .map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decode a response body from `provider`.
///
/// # Errors
///
/// Returns a [`ParseError`] describing why the body yielded no readings.
/// This function never panics on arbitrary input.
///
/// ```
/// use airsense_core::parse::parse;
/// use airsense_types::{AirQuality, Pollutant, Provider};
///
/// let body = r#"[{"ParameterName":"O3","AQI":40},{"ParameterName":"PM10","AQI":120}]"#;
/// let readings = parse(&Provider::AirNow, body).unwrap();
/// assert_eq!(readings.get(Pollutant::Pm10), Some(120.0));
/// assert_eq!(readings.category, Some(AirQuality::Fair));
/// ```
pub fn parse(provider: &Provider, body: &str) -> Result<NormalizedReadings, ParseError> {
    match provider {
        Provider::AirNow => parse_airnow(body),
        Provider::Aqicn => parse_aqicn(body),
        Provider::Unknown(name) => Err(ParseError::UnsupportedProvider(name.clone())),
    }
}

fn decode(body: &str) -> Result<Value, ParseError> {
    serde_json::from_str(body).map_err(|e| ParseError::Malformed(e.to_string()))
}

fn parse_airnow(body: &str) -> Result<NormalizedReadings, ParseError> {
    let value = decode(body)?;
    let records = value
        .as_array()
        .ok_or_else(|| ParseError::Malformed("expected an array of observations".to_string()))?;

    let first = records.first().ok_or(ParseError::NoObservation)?;
    let mut max_aqi = number(first.get("AQI")).ok_or(ParseError::MissingField("AQI"))?;

    let mut readings = NormalizedReadings::default();
    for record in records {
        let Some(aqi) = number(record.get("AQI")) else {
            continue;
        };
        max_aqi = max_aqi.max(aqi);

        let pollutant = record
            .get("ParameterName")
            .and_then(Value::as_str)
            .and_then(Pollutant::from_airnow_parameter);
        if let Some(pollutant) = pollutant {
            readings.values.push((pollutant, aqi));
        }
    }
    readings.category = Some(classify(Some(max_aqi)));

    Ok(readings)
}

fn parse_aqicn(body: &str) -> Result<NormalizedReadings, ParseError> {
    let value = decode(body)?;
    let root = value
        .as_object()
        .ok_or_else(|| ParseError::Malformed("expected a feed object".to_string()))?;

    if root.get("status").and_then(Value::as_str) == Some("error") {
        return Err(ParseError::NoObservation);
    }

    let iaqi: &Map<String, Value> = root
        .get("data")
        .and_then(|data| data.get("iaqi"))
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingField("iaqi"))?;

    let mut readings = NormalizedReadings::default();
    for (code, entry) in iaqi {
        let Some(pollutant) = Pollutant::from_aqicn_code(code) else {
            continue;
        };
        let Some(aqi) = number(entry.get("v")) else {
            continue;
        };
        readings.values.push((pollutant, aqi));
        readings.category = Some(classify(Some(aqi)));
    }

    Ok(readings)
}

/// Read a JSON number, or a string holding one.
fn number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}
