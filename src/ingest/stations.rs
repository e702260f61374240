//! Transit station ingestion.
//!
//! Arrivals and departures come in two separate CSVs with the same layout
//! (`station,date,hour,trips,longitude,latitude`). Trips are summed per
//! (station, date, hour); the two halves then merge on their keys, with a
//! missing half counting as zero. Station coordinates are broadcast from
//! the first arrival row so every observation of a station carries the
//! same point.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{error, info};

use super::{StationObservation, parse_coordinate, read_csv_records};
use crate::error::PipelineError;
use crate::temporal::TimePoint;

#[derive(Debug, Deserialize)]
struct RawTripRecord {
    station: String,
    date: String,
    hour: String,
    trips: u64,
    longitude: String,
    latitude: String,
}

/// Average daily passenger volume of one station on one weekday,
/// exported next to the training table and reused by the prediction
/// feature generator for dates with no observed transit data.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeekdayAverage {
    pub station: String,
    /// Monday = 0 .. Sunday = 6.
    pub weekday: u32,
    pub passengers: f64,
}

fn sum_trips(
    records: &[RawTripRecord],
    station: &str,
) -> Result<BTreeMap<TimePoint, u64>, PipelineError> {
    let mut sums = BTreeMap::new();
    for (row, record) in records.iter().enumerate() {
        if record.station != station {
            continue;
        }
        let time = TimePoint::parse(&record.date, &record.hour).inspect_err(|e| {
            error!(row, station, error = %e, "Bad station row");
        })?;
        *sums.entry(time).or_insert(0) += record.trips;
    }
    Ok(sums)
}

fn station_location(
    records: &[RawTripRecord],
    station: &str,
) -> Result<(f64, f64), PipelineError> {
    let representative = records
        .iter()
        .find(|r| r.station == station)
        .ok_or_else(|| {
            PipelineError::Config(format!("station {station} has no rows in the transit data"))
        })?;
    Ok((
        parse_coordinate(&representative.longitude)?,
        parse_coordinate(&representative.latitude)?,
    ))
}

/// Loads both transit CSVs and produces hourly observations for every
/// configured station, ordered by station (in config order), then time.
pub fn load_station_observations(
    arrivals_path: &Path,
    departures_path: &Path,
    stations: &[String],
) -> Result<Vec<StationObservation>, PipelineError> {
    let arr_records: Vec<RawTripRecord> = read_csv_records(arrivals_path)?;
    let dep_records: Vec<RawTripRecord> = read_csv_records(departures_path)?;

    let mut observations = Vec::new();
    for station in stations {
        let arrivals = sum_trips(&arr_records, station)?;
        let departures = sum_trips(&dep_records, station)?;
        let (longitude, latitude) = station_location(&arr_records, station)?;

        // Union of the two key sets; a missing half is zero passengers.
        let mut times: Vec<TimePoint> = arrivals.keys().copied().collect();
        for t in departures.keys() {
            if !arrivals.contains_key(t) {
                times.push(*t);
            }
        }
        times.sort();

        for time in times {
            observations.push(StationObservation {
                station_name: station.clone(),
                time,
                longitude,
                latitude,
                arrivals: arrivals.get(&time).copied().unwrap_or(0),
                departures: departures.get(&time).copied().unwrap_or(0),
            });
        }
    }

    info!(
        observations = observations.len(),
        stations = stations.len(),
        "Transit data ingested"
    );
    Ok(observations)
}

/// Computes each station's mean arrivals plus mean departures per weekday.
pub fn weekday_averages(
    observations: &[StationObservation],
    stations: &[String],
) -> Vec<WeekdayAverage> {
    // (station index, weekday) -> (arrival sum, departure sum, row count)
    let mut buckets: HashMap<(usize, u32), (f64, f64, usize)> = HashMap::new();

    for obs in observations {
        let Some(idx) = stations.iter().position(|s| *s == obs.station_name) else {
            continue;
        };
        let entry = buckets.entry((idx, obs.time.weekday)).or_insert((0.0, 0.0, 0));
        entry.0 += obs.arrivals as f64;
        entry.1 += obs.departures as f64;
        entry.2 += 1;
    }

    let mut averages = Vec::new();
    for (idx, station) in stations.iter().enumerate() {
        for weekday in 0..7 {
            if let Some((arr, dep, n)) = buckets.get(&(idx, weekday)) {
                averages.push(WeekdayAverage {
                    station: station.clone(),
                    weekday,
                    passengers: arr / *n as f64 + dep / *n as f64,
                });
            }
        }
    }
    averages
}
