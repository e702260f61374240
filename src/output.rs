//! Table export: feature tables, predictions, and summaries land on disk
//! as CSV.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::fusion::features::FeatureRow;
use crate::ingest::stations::WeekdayAverage;

/// Writes a feature table (training or inference) with its header row.
pub fn write_feature_table(
    path: &Path,
    columns: &[String],
    rows: &[FeatureRow],
) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing feature table");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row.csv_record())?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Feature table written");
    Ok(())
}

/// One output row of a prediction run: the identifying columns of the
/// input plus the predicted count.
#[derive(Debug, Serialize)]
struct PredictionRecord<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Hour")]
    hour: u32,
    #[serde(rename = "Sensor")]
    sensor: &'a str,
    #[serde(rename = "SensorLongitude")]
    longitude: f64,
    #[serde(rename = "SensorLatitude")]
    latitude: f64,
    #[serde(rename = "CrowdednessCount")]
    crowdedness_count: f64,
}

/// Writes predicted counts next to the rows they were generated from.
pub fn write_predictions(path: &Path, rows: &[FeatureRow], values: &[f64]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    for (row, value) in rows.iter().zip(values) {
        writer.serialize(PredictionRecord {
            date: row.date.format("%Y-%m-%d").to_string(),
            hour: row.hour,
            sensor: &row.sensor,
            longitude: row.longitude,
            latitude: row.latitude,
            crowdedness_count: *value,
        })?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Predictions written");
    Ok(())
}

/// Writes the per-station weekday passenger averages.
pub fn write_weekday_averages(path: &Path, averages: &[WeekdayAverage]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    for average in averages {
        writer.serialize(average)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = averages.len(), "Weekday averages written");
    Ok(())
}
