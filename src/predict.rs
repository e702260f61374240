//! Prediction-time feature generation: the inference mirror of the
//! fusion engine.
//!
//! For every queried sensor (or custom coordinate) and every date in the
//! requested range, this emits the 24 hourly rows of the training schema
//! minus the label, using the persisted scalers and the reference table
//! the build step exported. Per-station passenger volumes come from the
//! weekday averages, since future dates have no observed transit data;
//! `is_event` is 0 on generated rows.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::BoundingBox;
use crate::error::PipelineError;
use crate::fusion::features::{
    FeatureBuilder, FeatureRow, PassengerSource, StationMeta, feature_columns,
};
use crate::fusion::FusedTable;
use crate::ingest::SensorObservation;
use crate::ingest::stations::WeekdayAverage;
use crate::spatial::CoordinateScalers;
use crate::temporal::{TimePoint, bucket_hours};

/// Everything prediction needs besides the scalers: station reference
/// data, known sensor locations, weekday passenger averages, and the
/// kernel bandwidth the training table was built with. Persisted as JSON
/// next to the scalers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionContext {
    pub stations: Vec<StationRef>,
    pub sensors: BTreeMap<String, (f64, f64)>,
    pub weekday_passengers: Vec<WeekdayAverage>,
    pub gamma: f64,
}

/// A reference station's unscaled location; scaled coordinates are
/// recomputed from the loaded scalers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRef {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl PredictionContext {
    /// Captures the reference data of a finished build.
    pub fn from_build(
        table: &FusedTable,
        sensors: &[SensorObservation],
        weekday_passengers: Vec<WeekdayAverage>,
        gamma: f64,
    ) -> Self {
        let mut sensor_map = BTreeMap::new();
        for obs in sensors {
            sensor_map
                .entry(obs.sensor_id.clone())
                .or_insert((obs.longitude, obs.latitude));
        }
        PredictionContext {
            stations: table
                .stations
                .iter()
                .map(|m| StationRef {
                    name: m.name.clone(),
                    longitude: m.longitude,
                    latitude: m.latitude,
                })
                .collect(),
            sensors: sensor_map,
            weekday_passengers,
            gamma,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn station_names(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.name.clone()).collect()
    }
}

/// What to generate features for: a known sensor, or an arbitrary point.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Sensor(String),
    Point { longitude: f64, latitude: f64 },
}

/// A query that could not produce rows, kept alongside the results so one
/// bad point never sinks the batch.
#[derive(Debug)]
pub struct RejectedQuery {
    pub target: QueryTarget,
    pub error: PipelineError,
}

/// Generated inference inputs plus the per-point rejections.
#[derive(Debug)]
pub struct GeneratedFeatures {
    /// Inference schema: the training columns without the label.
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
    pub rejected: Vec<RejectedQuery>,
}

/// Passenger volumes answered from per-(station, weekday) averages.
struct AveragePassengers {
    by_key: BTreeMap<(usize, u32), f64>,
}

impl AveragePassengers {
    fn index(averages: &[WeekdayAverage], stations: &[StationRef]) -> Self {
        let mut by_key = BTreeMap::new();
        for avg in averages {
            if let Some(idx) = stations.iter().position(|s| s.name == avg.station) {
                by_key.insert((idx, avg.weekday), avg.passengers);
            }
        }
        AveragePassengers { by_key }
    }
}

impl PassengerSource for AveragePassengers {
    fn volume(&self, station: usize, date: NaiveDate, _hour: u32) -> f64 {
        let weekday = date.weekday().num_days_from_monday();
        self.by_key.get(&(station, weekday)).copied().unwrap_or(0.0)
    }
}

/// All dates in `[start, end)`, matching the reference implementation's
/// exclusive upper bound.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d < end).collect()
}

/// Generates the inference feature table for the queried targets over
/// `[start, end)`.
///
/// Custom points outside the bounding box and unknown sensor ids are
/// reported in `rejected` while the remaining targets still produce rows.
/// The scalers are consumed as-is; nothing is refit here.
pub fn generate_features(
    context: &PredictionContext,
    scalers: &CoordinateScalers,
    bounds: &BoundingBox,
    targets: &[QueryTarget],
    start: NaiveDate,
    end: NaiveDate,
) -> GeneratedFeatures {
    let station_meta: Vec<StationMeta> = context
        .stations
        .iter()
        .map(|s| StationMeta::new(s.name.clone(), s.longitude, s.latitude, scalers))
        .collect();
    let passengers = AveragePassengers::index(&context.weekday_passengers, &context.stations);
    let builder = FeatureBuilder::new(&station_meta, scalers, context.gamma);
    let dates = date_range(start, end);

    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for target in targets {
        let (label, longitude, latitude) = match target {
            QueryTarget::Sensor(id) => match context.sensors.get(id) {
                Some((lon, lat)) => (id.clone(), *lon, *lat),
                None => {
                    rejected.push(RejectedQuery {
                        target: target.clone(),
                        error: PipelineError::Config(format!("unknown sensor {id}")),
                    });
                    continue;
                }
            },
            QueryTarget::Point {
                longitude,
                latitude,
            } => {
                if !bounds.contains(*longitude, *latitude) {
                    rejected.push(RejectedQuery {
                        target: target.clone(),
                        error: PipelineError::OutOfBounds {
                            longitude: *longitude,
                            latitude: *latitude,
                        },
                    });
                    continue;
                }
                ("custom".to_string(), *longitude, *latitude)
            }
        };

        for date in &dates {
            for hour in bucket_hours() {
                // Hour values are bucket multiples by construction, so
                // this cannot fail
                let Ok(time) = TimePoint::new(*date, hour) else {
                    continue;
                };
                rows.push(builder.build_row(
                    &label, longitude, latitude, time, 0.0, &passengers, None,
                ));
            }
        }
    }

    for r in &rejected {
        warn!(query = ?r.target, error = %r.error, "Skipped prediction target");
    }
    info!(
        rows = rows.len(),
        targets = targets.len(),
        rejected = rejected.len(),
        "Generated prediction features"
    );
    GeneratedFeatures {
        columns: feature_columns(&context.station_names(), false),
        rows,
        rejected,
    }
}
