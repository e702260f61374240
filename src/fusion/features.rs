//! The authoritative feature schema and the shared per-row derivation.
//!
//! Training-table construction and prediction-time generation both funnel
//! through [`FeatureBuilder::build_row`]; the only thing that differs
//! between the two paths is where passenger volumes come from, abstracted
//! behind [`PassengerSource`]. Keeping a single implementation here is
//! what guarantees the two paths can never drift apart column-wise.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::error::PipelineError;
use crate::spatial::{CoordinateScalers, proximity_score, rbf_weight};
use crate::temporal::TimePoint;

/// Non-station columns, in output order. Station triples follow, then the
/// label on the training path.
pub const BASE_COLUMNS: &[&str] = &[
    "Date",
    "Hour",
    "Sensor",
    "SensorLongitude",
    "SensorLatitude",
    "weekday",
    "is_weekend",
    "month_sin",
    "month_cos",
    "day_sin",
    "day_cos",
    "hour_sin",
    "hour_cos",
    "is_event",
    "LonScaled",
    "LatScaled",
];

pub const LABEL_COLUMN: &str = "CrowdednessCount";

/// Columns identifying a row rather than describing it; dropped from the
/// numeric model input.
const IDENTIFIER_COLUMNS: &[&str] = &["Date", "Hour", "Sensor", "SensorLongitude", "SensorLatitude"];

/// Full column set for a feature table, with the label appended on the
/// training path.
pub fn feature_columns(stations: &[String], include_label: bool) -> Vec<String> {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for station in stations {
        columns.push(format!("{station} weight"));
        columns.push(format!("{station} score"));
        columns.push(format!("{station} passengers"));
    }
    if include_label {
        columns.push(LABEL_COLUMN.to_string());
    }
    columns
}

/// Column set the model itself consumes: identifiers and label removed.
pub fn model_columns(stations: &[String]) -> Vec<String> {
    feature_columns(stations, false)
        .into_iter()
        .filter(|c| !IDENTIFIER_COLUMNS.contains(&c.as_str()))
        .collect()
}

/// Verifies that `actual` contains exactly the `expected` column set
/// (order-independent).
pub fn check_schema(expected: &[String], actual: &[String]) -> Result<(), PipelineError> {
    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !actual.contains(*c))
        .map(String::clone)
        .collect();
    let unexpected: Vec<String> = actual
        .iter()
        .filter(|c| !expected.contains(*c))
        .map(String::clone)
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch { missing, unexpected })
    }
}

/// A reference station with its scaled coordinates, fixed for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationMeta {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub lon_scaled: f64,
    pub lat_scaled: f64,
}

impl StationMeta {
    pub fn new(name: String, longitude: f64, latitude: f64, scalers: &CoordinateScalers) -> Self {
        let (lon_scaled, lat_scaled) = scalers.transform(longitude, latitude);
        StationMeta {
            name,
            longitude,
            latitude,
            lon_scaled,
            lat_scaled,
        }
    }
}

/// Where a row's per-station passenger volumes come from.
///
/// The fusion path answers from the joined hourly observations; the
/// prediction path answers from per-weekday averages. Absence is 0.0,
/// never an error.
pub trait PassengerSource {
    fn volume(&self, station: usize, date: NaiveDate, hour: u32) -> f64;
}

/// Kernel weight, proximity score, and passenger volume for one station,
/// parallel to the builder's station list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationFeature {
    pub weight: f64,
    pub score: f64,
    pub passengers: f64,
}

/// One fused feature row. Immutable after creation; a row on the
/// prediction path simply has no label.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub hour: u32,
    pub sensor: String,
    pub longitude: f64,
    pub latitude: f64,
    pub weekday: u32,
    pub is_weekend: bool,
    pub month_sin: f64,
    pub month_cos: f64,
    pub day_sin: f64,
    pub day_cos: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub is_event: f64,
    pub lon_scaled: f64,
    pub lat_scaled: f64,
    pub stations: Vec<StationFeature>,
    pub crowdedness_count: Option<f64>,
}

impl FeatureRow {
    /// The row as CSV cells, ordered per [`feature_columns`].
    pub fn csv_record(&self) -> Vec<String> {
        let mut cells = vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.hour.to_string(),
            self.sensor.clone(),
            self.longitude.to_string(),
            self.latitude.to_string(),
            self.weekday.to_string(),
            (self.is_weekend as u8).to_string(),
            self.month_sin.to_string(),
            self.month_cos.to_string(),
            self.day_sin.to_string(),
            self.day_cos.to_string(),
            self.hour_sin.to_string(),
            self.hour_cos.to_string(),
            self.is_event.to_string(),
            self.lon_scaled.to_string(),
            self.lat_scaled.to_string(),
        ];
        for s in &self.stations {
            cells.push(s.weight.to_string());
            cells.push(s.score.to_string());
            cells.push(s.passengers.to_string());
        }
        if let Some(count) = self.crowdedness_count {
            cells.push(count.to_string());
        }
        cells
    }

    /// Numeric model input, ordered per [`model_columns`].
    pub fn model_input(&self) -> Vec<f64> {
        let mut values = vec![
            self.weekday as f64,
            self.is_weekend as u8 as f64,
            self.month_sin,
            self.month_cos,
            self.day_sin,
            self.day_cos,
            self.hour_sin,
            self.hour_cos,
            self.is_event,
            self.lon_scaled,
            self.lat_scaled,
        ];
        for s in &self.stations {
            values.push(s.weight);
            values.push(s.score);
            values.push(s.passengers);
        }
        values
    }
}

/// Derives complete feature rows for both pipeline paths.
pub struct FeatureBuilder<'a> {
    stations: &'a [StationMeta],
    scalers: &'a CoordinateScalers,
    gamma: f64,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(stations: &'a [StationMeta], scalers: &'a CoordinateScalers, gamma: f64) -> Self {
        FeatureBuilder {
            stations,
            scalers,
            gamma,
        }
    }

    /// Builds one row for a (point, time) pair.
    ///
    /// `label` is the observed crowdedness count on the training path and
    /// `None` on the prediction path; everything else is derived the same
    /// way on both.
    pub fn build_row(
        &self,
        sensor: &str,
        longitude: f64,
        latitude: f64,
        time: TimePoint,
        is_event: f64,
        passengers: &dyn PassengerSource,
        label: Option<f64>,
    ) -> FeatureRow {
        let (lon_scaled, lat_scaled) = self.scalers.transform(longitude, latitude);

        let month_angle = TAU * f64::from(time.date.month()) / 12.0;
        // Day of month over 365, as the source data pipeline defines it;
        // the leap-year error is an accepted approximation.
        let day_angle = TAU * f64::from(time.date.day()) / 365.0;
        let hour_angle = TAU * f64::from(time.hour) / 2400.0;

        let stations = self
            .stations
            .iter()
            .enumerate()
            .map(|(i, station)| {
                let weight = rbf_weight(
                    (lon_scaled, lat_scaled),
                    (station.lon_scaled, station.lat_scaled),
                    self.gamma,
                );
                let volume = passengers.volume(i, time.date, time.hour);
                StationFeature {
                    weight,
                    score: proximity_score(weight, volume),
                    passengers: volume,
                }
            })
            .collect();

        FeatureRow {
            date: time.date,
            hour: time.hour,
            sensor: sensor.to_string(),
            longitude,
            latitude,
            weekday: time.weekday,
            is_weekend: time.is_weekend,
            month_sin: month_angle.sin(),
            month_cos: month_angle.cos(),
            day_sin: day_angle.sin(),
            day_cos: day_angle.cos(),
            hour_sin: hour_angle.sin(),
            hour_cos: hour_angle.cos(),
            is_event,
            lon_scaled,
            lat_scaled,
            stations,
            crowdedness_count: label,
        }
    }
}
