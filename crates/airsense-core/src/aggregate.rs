//! Merging a cycle's result into the previous reading.

use airsense_types::{SensorReading, StatusFault};

use crate::parse::NormalizedReadings;

/// Combine the previous reading with this cycle's parse outcome.
///
/// - On failure the previous values are kept and the reading is faulted.
/// - On success every pollutant the response carried is overwritten, the
///   others stay at their last observed value, and the fault clears. The
///   category is replaced only when the parse produced one.
///
/// The function is pure: applying the same outcome twice yields the same
/// reading.
///
/// ```
/// use airsense_core::aggregate::aggregate;
/// use airsense_core::parse::NormalizedReadings;
/// use airsense_types::{Pollutant, SensorReading};
///
/// let mut previous = SensorReading::default();
/// previous.pm10_density = 40.0;
///
/// let readings = NormalizedReadings {
///     values: vec![(Pollutant::Ozone, 12.0)],
///     category: None,
/// };
/// let next = aggregate(&previous, Ok::<_, ()>(&readings));
/// assert_eq!(next.pm10_density, 40.0);
/// assert_eq!(next.ozone_density, 12.0);
/// ```
pub fn aggregate<E>(
    previous: &SensorReading,
    outcome: Result<&NormalizedReadings, E>,
) -> SensorReading {
    match outcome {
        Ok(readings) => apply(previous, readings),
        Err(_) => previous.with_fault(),
    }
}

fn apply(previous: &SensorReading, readings: &NormalizedReadings) -> SensorReading {
    let mut next = *previous;
    for &(pollutant, value) in &readings.values {
        next.set(pollutant, value);
    }
    if let Some(category) = readings.category {
        next.air_quality = category;
    }
    next.status_fault = StatusFault::NoFault;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ParseError};
    use airsense_types::{AirQuality, Pollutant};

    fn previous() -> SensorReading {
        SensorReading {
            air_quality: AirQuality::Good,
            ozone_density: 11.0,
            nitrogen_dioxide_density: 7.0,
            sulphur_dioxide_density: 2.0,
            pm2_5_density: 33.0,
            pm10_density: 40.0,
            carbon_monoxide_level: 1.0,
            status_fault: StatusFault::GeneralFault,
        }
    }

    fn readings(values: &[(Pollutant, f64)], category: Option<AirQuality>) -> NormalizedReadings {
        NormalizedReadings {
            values: values.to_vec(),
            category,
        }
    }

    #[test]
    fn test_success_overwrites_present_and_clears_fault() {
        let result = readings(
            &[(Pollutant::Ozone, 40.0), (Pollutant::Pm10, 120.0)],
            Some(AirQuality::Fair),
        );
        let next = aggregate(&previous(), Ok::<_, ParseError>(&result));
        assert_eq!(next.ozone_density, 40.0);
        assert_eq!(next.pm10_density, 120.0);
        assert_eq!(next.air_quality, AirQuality::Fair);
        assert_eq!(next.status_fault, StatusFault::NoFault);
    }

    #[test]
    fn test_absent_fields_are_sticky() {
        let result = readings(&[(Pollutant::Ozone, 5.0)], Some(AirQuality::Excellent));
        let next = aggregate(&previous(), Ok::<_, ParseError>(&result));
        assert_eq!(next.pm10_density, 40.0);
        assert_eq!(next.pm2_5_density, 33.0);
        assert_eq!(next.nitrogen_dioxide_density, 7.0);
        assert_eq!(next.carbon_monoxide_level, 1.0);
    }

    #[test]
    fn test_no_category_keeps_previous_category() {
        let result = readings(&[], None);
        let next = aggregate(&previous(), Ok::<_, ParseError>(&result));
        assert_eq!(next.air_quality, AirQuality::Good);
        assert_eq!(next.status_fault, StatusFault::NoFault);
    }

    #[test]
    fn test_failure_preserves_values_and_faults() {
        let mut before = previous();
        before.status_fault = StatusFault::NoFault;
        let next = aggregate(&before, Err::<&NormalizedReadings, _>(Error::network("timed out")));
        assert_eq!(next.status_fault, StatusFault::GeneralFault);
        for pollutant in Pollutant::ALL {
            assert_eq!(next.get(pollutant), before.get(pollutant));
        }
        assert_eq!(next.air_quality, before.air_quality);
    }

    #[test]
    fn test_parse_failure_faults() {
        let next = aggregate(
            &SensorReading::default(),
            Err::<&NormalizedReadings, _>(ParseError::NoObservation),
        );
        assert!(next.is_faulted());
    }

    #[test]
    fn test_idempotent() {
        let result = readings(
            &[(Pollutant::Pm2_5, 60.0), (Pollutant::Ozone, 10.0)],
            Some(AirQuality::Excellent),
        );
        let once = aggregate(&previous(), Ok::<_, ParseError>(&result));
        let twice = aggregate(&once, Ok::<_, ParseError>(&result));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_later_duplicate_wins() {
        let result = readings(&[(Pollutant::Pm10, 10.0), (Pollutant::Pm10, 20.0)], None);
        let next = aggregate(&previous(), Ok::<_, ParseError>(&result));
        assert_eq!(next.pm10_density, 20.0);
    }
}
