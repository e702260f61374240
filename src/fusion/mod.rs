//! The Feature Fusion Engine: three aligned observation series become one
//! training feature table.
//!
//! Station readings join sensor readings on (date, hour), events join on
//! date alone, and every missing numeric cell fills with 0.0: absence of
//! a reading is "zero", not "unknown". The coordinate scalers are fit
//! here, exactly once per run, before any row is derived.

pub mod align;
pub mod features;

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::{EventObservation, SensorObservation, StationObservation};
use crate::spatial::CoordinateScalers;
pub use align::{AlignedSeries, DateRange, align};
pub use features::{
    FeatureBuilder, FeatureRow, PassengerSource, StationMeta, check_schema, feature_columns,
    model_columns,
};

/// The fused training table together with the run's fitted spatial state.
#[derive(Debug)]
pub struct FusedTable {
    /// Training schema, label column included.
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
    /// `None` only when the input ranges were disjoint and there was
    /// nothing to fit on.
    pub scalers: Option<CoordinateScalers>,
    pub stations: Vec<StationMeta>,
}

/// Passenger volumes answered from the joined hourly observations.
struct ObservedPassengers {
    by_key: HashMap<(usize, NaiveDate, u32), f64>,
}

impl ObservedPassengers {
    fn index(observations: &[StationObservation], stations: &[String]) -> Self {
        let mut by_key = HashMap::new();
        for obs in observations {
            if let Some(idx) = stations.iter().position(|s| *s == obs.station_name) {
                by_key.insert((idx, obs.time.date, obs.time.hour), obs.passengers());
            }
        }
        ObservedPassengers { by_key }
    }
}

impl PassengerSource for ObservedPassengers {
    fn volume(&self, station: usize, date: NaiveDate, hour: u32) -> f64 {
        self.by_key
            .get(&(station, date, hour))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Looks up each configured station's broadcast coordinates.
fn station_coordinates(
    observations: &[StationObservation],
    config: &PipelineConfig,
) -> Result<Vec<(String, f64, f64)>, PipelineError> {
    config
        .stations
        .iter()
        .map(|name| {
            observations
                .iter()
                .find(|o| o.station_name == *name)
                .map(|o| (name.clone(), o.longitude, o.latitude))
                .ok_or_else(|| {
                    PipelineError::Config(format!("station {name} has no observations"))
                })
        })
        .collect()
}

/// Fuses the three observation series into the training feature table.
///
/// Rows come out sorted by date (stable within a date), one per aggregated
/// sensor observation; fusing the same inputs twice yields identical
/// output.
pub fn fuse(
    sensors: Vec<SensorObservation>,
    stations: Vec<StationObservation>,
    events: Vec<EventObservation>,
    config: &PipelineConfig,
) -> Result<FusedTable, PipelineError> {
    let columns = feature_columns(&config.stations, true);

    // Coordinates are range-independent; resolve them before alignment so
    // a disjoint-range run still reports its station set.
    let coordinates = station_coordinates(&stations, config)?;

    let aligned = align(sensors, stations, events);
    if aligned.sensors.is_empty() {
        return Ok(FusedTable {
            columns,
            rows: Vec::new(),
            scalers: None,
            stations: Vec::new(),
        });
    }

    // Fit both scalers over the union of the distinct sensor and station
    // coordinates entering the table. Zero-filled cells are not
    // coordinates and never reach the fit.
    let mut longitudes: Vec<f64> = Vec::new();
    let mut latitudes: Vec<f64> = Vec::new();
    let mut seen_sensors = HashSet::new();
    for obs in &aligned.sensors {
        if seen_sensors.insert(obs.sensor_id.clone()) {
            longitudes.push(obs.longitude);
            latitudes.push(obs.latitude);
        }
    }
    for (_, lon, lat) in &coordinates {
        longitudes.push(*lon);
        latitudes.push(*lat);
    }
    let scalers = CoordinateScalers::fit(&longitudes, &latitudes)?;

    let station_meta: Vec<StationMeta> = coordinates
        .into_iter()
        .map(|(name, lon, lat)| StationMeta::new(name, lon, lat, &scalers))
        .collect();

    let passengers = ObservedPassengers::index(&aligned.stations, &config.stations);
    let event_dates: HashSet<NaiveDate> = aligned.events.iter().map(|e| e.date).collect();

    let mut observations = aligned.sensors;
    observations.sort_by_key(|o| o.time.date);

    let builder = FeatureBuilder::new(&station_meta, &scalers, config.gamma);
    let rows: Vec<FeatureRow> = observations
        .iter()
        .map(|obs| {
            let is_event = if event_dates.contains(&obs.time.date) {
                1.0
            } else {
                0.0
            };
            builder.build_row(
                &obs.sensor_id,
                obs.longitude,
                obs.latitude,
                obs.time,
                is_event,
                &passengers,
                Some(obs.crowdedness_count),
            )
        })
        .collect();

    info!(
        rows = rows.len(),
        columns = columns.len(),
        stations = station_meta.len(),
        "Feature table fused"
    );
    Ok(FusedTable {
        columns,
        rows,
        scalers: Some(scalers),
        stations: station_meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::temporal::TimePoint;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sensor(id: &str, d: NaiveDate, hour: u32, count: f64) -> SensorObservation {
        SensorObservation {
            sensor_id: id.into(),
            time: TimePoint::new(d, hour).unwrap(),
            longitude: 4.901,
            latitude: 52.374,
            crowdedness_count: count,
        }
    }

    fn station(name: &str, d: NaiveDate, hour: u32, arr: u64, dep: u64) -> StationObservation {
        let (lon, lat) = if name == "Dam" {
            (4.893, 52.373)
        } else {
            (4.889, 52.368)
        };
        StationObservation {
            station_name: name.into(),
            time: TimePoint::new(d, hour).unwrap(),
            longitude: lon,
            latitude: lat,
            arrivals: arr,
            departures: dep,
        }
    }

    fn inputs() -> (
        Vec<SensorObservation>,
        Vec<StationObservation>,
        Vec<EventObservation>,
    ) {
        let d1 = date(2019, 5, 1);
        let d2 = date(2019, 5, 2);
        (
            vec![
                sensor("GAWW-02", d1, 1400, 42.0),
                sensor("GAWW-02", d2, 1400, 17.0),
            ],
            vec![
                station("Nieuwmarkt", d1, 1400, 30, 20),
                station("Dam", d1, 1400, 100, 50),
                station("Dam", d2, 900, 10, 10),
            ],
            vec![EventObservation { date: d2 }],
        )
    }

    #[test]
    fn test_fuse_joins_and_zero_fills() {
        let (sensors, stations, events) = inputs();
        let table = fuse(sensors, stations, events, &test_config()).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.columns.len(), table.rows[0].csv_record().len());

        // Day one: both stations have 14:00 readings, no event
        let r1 = &table.rows[0];
        assert_eq!(r1.date, date(2019, 5, 1));
        assert_eq!(r1.is_event, 0.0);
        assert_eq!(r1.stations[0].passengers, 50.0); // Nieuwmarkt
        assert_eq!(r1.stations[1].passengers, 150.0); // Dam
        assert_eq!(r1.crowdedness_count, Some(42.0));

        // Day two: no station reading at 14:00, but an event. Passenger
        // cells fill with zero, and zero volume zeroes the score too
        let r2 = &table.rows[1];
        assert_eq!(r2.is_event, 1.0);
        assert_eq!(r2.stations[1].passengers, 0.0);
        assert_eq!(r2.stations[1].score, 0.0);
        assert!(r2.stations[1].weight > 0.0);
    }

    #[test]
    fn test_fuse_is_deterministic() {
        let (sensors, stations, events) = inputs();
        let a = fuse(
            sensors.clone(),
            stations.clone(),
            events.clone(),
            &test_config(),
        )
        .unwrap();
        let b = fuse(sensors, stations, events, &test_config()).unwrap();

        assert_eq!(a.rows, b.rows);
        assert_eq!(a.scalers, b.scalers);
    }

    #[test]
    fn test_fuse_disjoint_ranges_yields_empty_table() {
        let sensors = vec![sensor("GAWW-02", date(2019, 5, 1), 1400, 42.0)];
        let stations = vec![
            station("Nieuwmarkt", date(2018, 1, 1), 1400, 1, 1),
            station("Dam", date(2018, 1, 1), 1400, 1, 1),
        ];

        let table = fuse(sensors, stations, Vec::new(), &test_config()).unwrap();

        assert!(table.rows.is_empty());
        assert!(table.scalers.is_none());
        assert_eq!(table.columns, feature_columns(&test_config().stations, true));
    }

    #[test]
    fn test_fuse_fails_on_station_without_observations() {
        let (sensors, mut stations, events) = inputs();
        stations.retain(|s| s.station_name != "Dam");

        let err = fuse(sensors, stations, events, &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
