//! Crowdedness sensor ingestion.
//!
//! Two files feed this loader: an hourly counts CSV (`sensor,date,hour,count`)
//! whose sensor labels drift across feed snapshots, and a coordinates CSV
//! (`sensor,longitude,latitude`) keyed by canonical id. Labels are resolved
//! through the configured alias groups, unconfigured sensors are dropped,
//! and duplicate (sensor, date, hour) keys sum their counts.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, error, info};

use super::{SensorObservation, parse_coordinate, read_csv_records};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::temporal::TimePoint;

#[derive(Debug, Deserialize)]
struct RawCountRecord {
    sensor: String,
    date: String,
    hour: String,
    count: f64,
}

#[derive(Debug, Deserialize)]
struct RawCoordinateRecord {
    sensor: String,
    longitude: String,
    latitude: String,
}

/// Reads the coordinates CSV and returns canonical id -> (lon, lat) for
/// every configured sensor.
pub fn load_sensor_coordinates(
    path: &Path,
    config: &PipelineConfig,
) -> Result<HashMap<String, (f64, f64)>, PipelineError> {
    let records: Vec<RawCoordinateRecord> = read_csv_records(path)?;

    let mut locations = HashMap::new();
    for record in &records {
        if config.canonical_sensor(&record.sensor) == Some(record.sensor.as_str()) {
            let lon = parse_coordinate(&record.longitude)?;
            let lat = parse_coordinate(&record.latitude)?;
            locations.insert(record.sensor.clone(), (lon, lat));
        }
    }
    Ok(locations)
}

/// Loads, canonicalizes, and aggregates the sensor counts.
///
/// # Errors
///
/// Fails on an unparseable date or hour (the offending row is logged), and
/// with [`PipelineError::Config`] when a configured sensor has no entry in
/// the coordinates file.
pub fn load_sensor_observations(
    counts_path: &Path,
    coordinates_path: &Path,
    config: &PipelineConfig,
) -> Result<Vec<SensorObservation>, PipelineError> {
    let locations = load_sensor_coordinates(coordinates_path, config)?;
    let records: Vec<RawCountRecord> = read_csv_records(counts_path)?;

    // Sum duplicate keys; BTreeMap keeps the output deterministic.
    let mut aggregated: BTreeMap<(String, TimePoint), f64> = BTreeMap::new();
    let mut dropped = 0usize;

    for (row, record) in records.iter().enumerate() {
        let Some(sensor_id) = config.canonical_sensor(&record.sensor) else {
            dropped += 1;
            continue;
        };

        let time = TimePoint::parse(&record.date, &record.hour).inspect_err(|e| {
            error!(row, sensor = %record.sensor, error = %e, "Bad sensor row");
        })?;

        *aggregated
            .entry((sensor_id.to_string(), time))
            .or_insert(0.0) += record.count;
    }

    if dropped > 0 {
        debug!(dropped, "Skipped rows from unconfigured sensors");
    }

    let mut observations = Vec::with_capacity(aggregated.len());
    for ((sensor_id, time), count) in aggregated {
        let (longitude, latitude) = *locations.get(&sensor_id).ok_or_else(|| {
            PipelineError::Config(format!("no coordinates for sensor {sensor_id}"))
        })?;
        observations.push(SensorObservation {
            sensor_id,
            time,
            longitude,
            latitude,
            crowdedness_count: count,
        });
    }

    info!(
        observations = observations.len(),
        raw_rows = records.len(),
        "Sensor counts ingested"
    );
    Ok(observations)
}
