//! Raw data loading: sensor counts, transit arrival/departure logs, and
//! event listings become typed, canonicalized observations.

pub mod events;
pub mod sensors;
pub mod stations;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

use crate::error::PipelineError;
use crate::temporal::TimePoint;

/// One aggregated hourly reading from a crowdedness sensor, after alias
/// canonicalization. Duplicate (sensor, date, hour) keys are summed away
/// during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorObservation {
    pub sensor_id: String,
    pub time: TimePoint,
    pub longitude: f64,
    pub latitude: f64,
    pub crowdedness_count: f64,
}

/// Hourly passenger totals for one transit station. Coordinates are
/// broadcast from a single representative row, so they are constant per
/// station across all observations.
#[derive(Debug, Clone, PartialEq)]
pub struct StationObservation {
    pub station_name: String,
    pub time: TimePoint,
    pub longitude: f64,
    pub latitude: f64,
    pub arrivals: u64,
    pub departures: u64,
}

impl StationObservation {
    /// Total passenger volume for the row.
    pub fn passengers(&self) -> f64 {
        (self.arrivals + self.departures) as f64
    }
}

/// A date on which at least one in-bounds event takes place. The flag
/// itself is implicit; duplicates collapse in the fusion join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventObservation {
    pub date: NaiveDate,
}

/// Parses a coordinate that may use a decimal comma ("52,37") or a
/// decimal point.
pub fn parse_coordinate(raw: &str) -> Result<f64, PipelineError> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| PipelineError::Parse {
            kind: "coordinate",
            value: raw.to_string(),
        })
}

/// Deserializes every record of a CSV file into `T`.
pub fn read_csv_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_decimal_comma() {
        assert_eq!(parse_coordinate("52,37").unwrap(), 52.37);
        assert_eq!(parse_coordinate("4.9").unwrap(), 4.9);
        assert_eq!(parse_coordinate(" 4,901 ").unwrap(), 4.901);
    }

    #[test]
    fn test_parse_coordinate_rejects_garbage() {
        assert!(parse_coordinate("north").is_err());
    }

    #[test]
    fn test_station_passenger_volume() {
        let obs = StationObservation {
            station_name: "Dam".into(),
            time: TimePoint::parse("2019-05-01", "14:00:00").unwrap(),
            longitude: 4.89,
            latitude: 52.373,
            arrivals: 100,
            departures: 50,
        };
        assert_eq!(obs.passengers(), 150.0);
    }
}
