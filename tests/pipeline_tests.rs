//! End-to-end pipeline tests: ingest fixture files, fuse, and generate
//! prediction features against the same schema.

use chrono::NaiveDate;
use crowdcast::config::{BoundingBox, EventWindow, PipelineConfig, SensorAlias};
use crowdcast::fusion::fuse;
use crowdcast::ingest::events::load_event_observations;
use crowdcast::ingest::sensors::load_sensor_observations;
use crowdcast::ingest::stations::{load_station_observations, weekday_averages};
use crowdcast::model::{MeanPredictor, ModelInput, run_predictor};
use crowdcast::predict::{PredictionContext, QueryTarget, generate_features};
use std::fs;
use std::path::PathBuf;

fn config() -> PipelineConfig {
    PipelineConfig {
        stations: vec!["Dam".into()],
        sensors: vec![SensorAlias {
            id: "S1".into(),
            aliases: vec!["cam-s1".into()],
        }],
        bounds: BoundingBox {
            lon_min: 4.88,
            lon_max: 4.92,
            lat_min: 52.36,
            lat_max: 52.39,
        },
        events: EventWindow {
            start: NaiveDate::from_ymd_opt(2018, 3, 11).unwrap(),
            end: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
        },
        gamma: 0.5,
    }
}

fn fixture(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    fs::write(&path, content).unwrap();
    path
}

const COUNTS: &str = "sensor,date,hour,count\n\
    S1,2019-05-01,14:00:00,42\n\
    S1,2019-05-01,00:00:00,7\n";

const COORDINATES: &str = "sensor,longitude,latitude\n\
    S1,\"4,901\",\"52,374\"\n";

const ARRIVALS: &str = "station,date,hour,trips,longitude,latitude\n\
    Dam,5/1/2019 02:00:00 PM,14:00:00,100,4.893,52.373\n";

const DEPARTURES: &str = "station,date,hour,trips,longitude,latitude\n\
    Dam,5/1/2019 02:00:00 PM,14:00:00,50,4.893,52.373\n";

// One event on the sensor date but outside the bounding box, one inside
const EVENTS: &str = r#"[
    {
        "title": "Outside the box",
        "dates": {"singles": ["01-05-2019"]},
        "location": {"latitude": "52,30", "longitude": "4,70"}
    },
    {
        "title": "On the square",
        "dates": {"singles": ["01-05-2019"]},
        "location": {"latitude": "52,372", "longitude": "4,893"}
    }
]"#;

#[test]
fn test_full_pipeline() {
    let config = config();
    let counts = fixture("crowdcast_e2e_counts.csv", COUNTS);
    let coords = fixture("crowdcast_e2e_coords.csv", COORDINATES);
    let arr = fixture("crowdcast_e2e_arr.csv", ARRIVALS);
    let dep = fixture("crowdcast_e2e_dep.csv", DEPARTURES);
    let events = fixture("crowdcast_e2e_events.json", EVENTS);

    let sensor_obs = load_sensor_observations(&counts, &coords, &config).unwrap();
    let station_obs = load_station_observations(&arr, &dep, &config.stations).unwrap();
    let event_obs = load_event_observations(&events, &config).unwrap();
    let averages = weekday_averages(&station_obs, &config.stations);

    let table = fuse(sensor_obs.clone(), station_obs, event_obs, &config).unwrap();

    // The midnight reading and the 14:00 reading, sorted by date
    assert_eq!(table.rows.len(), 2);

    let row = table
        .rows
        .iter()
        .find(|r| r.hour == 1400)
        .expect("14:00 row");
    // 2019-05-01 was a Wednesday
    assert_eq!(row.weekday, 2);
    assert!(!row.is_weekend);
    assert_eq!(row.sensor, "S1");
    assert_eq!(row.crowdedness_count, Some(42.0));
    // "Dam passengers" = 100 arrivals + 50 departures
    assert_eq!(row.stations[0].passengers, 150.0);
    // The in-box event flags the date; the out-of-box one was discarded
    // during ingestion
    assert_eq!(row.is_event, 1.0);

    // "00:00:00" lands in bucket 2400, never 0
    let midnight = table.rows.iter().find(|r| r.hour == 2400).expect("2400 row");
    assert_eq!(midnight.crowdedness_count, Some(7.0));
    assert!(table.rows.iter().all(|r| r.hour >= 100 && r.hour <= 2400));

    // Prediction path: same schema minus the label, same scalers
    let scalers = table.scalers.expect("fitted scalers");
    let context = PredictionContext::from_build(&table, &sensor_obs, averages, config.gamma);
    let generated = generate_features(
        &context,
        &scalers,
        &config.bounds,
        &[QueryTarget::Sensor("S1".into())],
        NaiveDate::from_ymd_opt(2019, 5, 2).unwrap(),
        NaiveDate::from_ymd_opt(2019, 5, 3).unwrap(),
    );
    assert_eq!(generated.rows.len(), 24);

    let mut train_columns = table.columns.clone();
    assert_eq!(train_columns.pop().as_deref(), Some("CrowdednessCount"));
    assert_eq!(train_columns, generated.columns);

    // The baseline predictor accepts the generated features
    let model = MeanPredictor::fit(&table, &config.stations);
    let input = ModelInput::from_feature_rows(&config.stations, &generated.rows);
    let values = run_predictor(&model, &input).unwrap();
    assert_eq!(values.len(), 24);
    assert_eq!(values[0], (42.0 + 7.0) / 2.0);

    for path in [counts, coords, arr, dep, events] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn test_event_outside_box_does_not_flag_matching_date() {
    let config = config();
    let counts = fixture("crowdcast_e2e2_counts.csv", COUNTS);
    let coords = fixture("crowdcast_e2e2_coords.csv", COORDINATES);
    let arr = fixture("crowdcast_e2e2_arr.csv", ARRIVALS);
    let dep = fixture("crowdcast_e2e2_dep.csv", DEPARTURES);
    // Only the out-of-box event this time
    let events = fixture(
        "crowdcast_e2e2_events.json",
        r#"[
            {
                "title": "Outside the box",
                "dates": {"singles": ["01-05-2019"]},
                "location": {"latitude": "52,30", "longitude": "4,70"}
            }
        ]"#,
    );

    let sensor_obs = load_sensor_observations(&counts, &coords, &config).unwrap();
    let station_obs = load_station_observations(&arr, &dep, &config.stations).unwrap();
    let event_obs = load_event_observations(&events, &config).unwrap();
    assert!(event_obs.is_empty());

    let table = fuse(sensor_obs, station_obs, event_obs, &config).unwrap();
    assert!(table.rows.iter().all(|r| r.is_event == 0.0));

    for path in [counts, coords, arr, dep, events] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn test_sensor_colocated_with_stations_gets_unit_weights() {
    let mut config = config();
    config.stations = vec!["Dam".into(), "Spui".into()];
    config.sensors.push(SensorAlias {
        id: "S2".into(),
        aliases: vec![],
    });

    // S1 sits exactly on both stations; S2 elsewhere keeps the scaler fit
    // non-degenerate
    let counts = fixture(
        "crowdcast_e2e3_counts.csv",
        "sensor,date,hour,count\n\
         S1,2019-05-01,14:00:00,42\n\
         S2,2019-05-01,14:00:00,5\n",
    );
    let coords = fixture(
        "crowdcast_e2e3_coords.csv",
        "sensor,longitude,latitude\n\
         S1,4.893,52.373\n\
         S2,4.912,52.381\n",
    );
    let arr = fixture(
        "crowdcast_e2e3_arr.csv",
        "station,date,hour,trips,longitude,latitude\n\
         Dam,5/1/2019 02:00:00 PM,14:00:00,100,4.893,52.373\n\
         Spui,5/1/2019 02:00:00 PM,14:00:00,30,4.893,52.373\n",
    );
    let dep = fixture(
        "crowdcast_e2e3_dep.csv",
        "station,date,hour,trips,longitude,latitude\n\
         Dam,5/1/2019 02:00:00 PM,14:00:00,50,4.893,52.373\n\
         Spui,5/1/2019 02:00:00 PM,14:00:00,20,4.893,52.373\n",
    );
    let events = fixture("crowdcast_e2e3_events.json", "[]");

    let sensor_obs = load_sensor_observations(&counts, &coords, &config).unwrap();
    let station_obs = load_station_observations(&arr, &dep, &config.stations).unwrap();
    let event_obs = load_event_observations(&events, &config).unwrap();

    let table = fuse(sensor_obs, station_obs, event_obs, &config).unwrap();

    let row = table.rows.iter().find(|r| r.sensor == "S1").unwrap();
    // Both stations share S1's scaled coordinates, so both weights are
    // exactly 1.0 and the scores reduce to the raw volumes
    assert_eq!(row.stations[0].weight, 1.0);
    assert_eq!(row.stations[0].score, 150.0);
    assert_eq!(row.stations[1].weight, 1.0);
    assert_eq!(row.stations[1].score, 50.0);

    let far = table.rows.iter().find(|r| r.sensor == "S2").unwrap();
    assert!(far.stations[0].weight < 1.0);

    for path in [counts, coords, arr, dep, events] {
        fs::remove_file(path).unwrap();
    }
}
