//! CLI entry point for the crowdcast pipeline.
//!
//! Provides subcommands for building the fused training table from the
//! raw feeds, generating prediction inputs and baseline predictions for
//! new locations and dates, and listing the ingested sensors.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crowdcast::config::PipelineConfig;
use crowdcast::fusion::fuse;
use crowdcast::ingest::events::load_event_observations;
use crowdcast::ingest::sensors::load_sensor_observations;
use crowdcast::ingest::stations::{load_station_observations, weekday_averages};
use crowdcast::model::{MeanPredictor, ModelInput, run_predictor};
use crowdcast::output::{write_feature_table, write_predictions, write_weekday_averages};
use crowdcast::predict::{PredictionContext, QueryTarget, generate_features};
use crowdcast::spatial::CoordinateScalers;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "crowdcast")]
#[command(about = "Fuses sensor, transit, and event data into crowdedness features", long_about = None)]
struct Cli {
    /// Path to the pipeline config JSON
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the fused training table and persist the run artifacts
    Build {
        /// Sensor counts CSV (sensor,date,hour,count)
        #[arg(long)]
        counts: PathBuf,

        /// Sensor coordinates CSV (sensor,longitude,latitude)
        #[arg(long)]
        coordinates: PathBuf,

        /// Transit arrivals CSV (station,date,hour,trips,longitude,latitude)
        #[arg(long)]
        arrivals: PathBuf,

        /// Transit departures CSV (same layout as arrivals)
        #[arg(long)]
        departures: PathBuf,

        /// Events JSON
        #[arg(long)]
        events: PathBuf,

        /// Directory for the training table and persisted state
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
    },
    /// Generate prediction features and baseline predictions
    Predict {
        /// Directory holding a previous build's artifacts
        #[arg(short, long, default_value = "output")]
        artifacts: PathBuf,

        /// Known sensor to predict for
        #[arg(short, long, conflicts_with_all = ["longitude", "latitude"])]
        sensor: Option<String>,

        /// Custom point longitude (requires --latitude)
        #[arg(long, requires = "latitude")]
        longitude: Option<f64>,

        /// Custom point latitude (requires --longitude)
        #[arg(long, requires = "longitude")]
        latitude: Option<f64>,

        /// First date to predict (inclusive)
        #[arg(long)]
        start: NaiveDate,

        /// Last date to predict (exclusive)
        #[arg(long)]
        end: NaiveDate,

        /// Predictions CSV path
        #[arg(short, long, default_value = "predictions.csv")]
        output: PathBuf,
    },
    /// List configured sensors found in the raw data
    Sensors {
        /// Sensor counts CSV
        #[arg(long)]
        counts: PathBuf,

        /// Sensor coordinates CSV
        #[arg(long)]
        coordinates: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/crowdcast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("crowdcast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Build {
            counts,
            coordinates,
            arrivals,
            departures,
            events,
            out_dir,
        } => build(
            &config,
            &counts,
            &coordinates,
            &arrivals,
            &departures,
            &events,
            &out_dir,
        ),
        Commands::Predict {
            artifacts,
            sensor,
            longitude,
            latitude,
            start,
            end,
            output,
        } => {
            let target = match (sensor, longitude, latitude) {
                (Some(id), None, None) => QueryTarget::Sensor(id),
                (None, Some(longitude), Some(latitude)) => QueryTarget::Point {
                    longitude,
                    latitude,
                },
                _ => bail!("specify either --sensor or --longitude/--latitude"),
            };
            predict(&config, &artifacts, target, start, end, &output)
        }
        Commands::Sensors {
            counts,
            coordinates,
        } => list_sensors(&config, &counts, &coordinates),
    }
}

/// Runs the full construction path: ingest, fuse, and persist the
/// training table plus everything prediction needs later.
fn build(
    config: &PipelineConfig,
    counts: &Path,
    coordinates: &Path,
    arrivals: &Path,
    departures: &Path,
    events: &Path,
    out_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let sensor_obs = load_sensor_observations(counts, coordinates, config)?;
    let station_obs = load_station_observations(arrivals, departures, &config.stations)?;
    let event_obs = load_event_observations(events, config)?;

    let averages = weekday_averages(&station_obs, &config.stations);
    let table = fuse(sensor_obs.clone(), station_obs, event_obs, config)?;

    write_feature_table(&out_dir.join("training.csv"), &table.columns, &table.rows)?;
    write_weekday_averages(&out_dir.join("weekday_averages.csv"), &averages)?;

    let Some(scalers) = table.scalers else {
        warn!("No overlapping dates across inputs; wrote an empty table and no artifacts");
        return Ok(());
    };
    scalers.save(&out_dir.join("scalers.json"))?;

    let context = PredictionContext::from_build(&table, &sensor_obs, averages, config.gamma);
    context.save(&out_dir.join("reference.json"))?;

    let model = MeanPredictor::fit(&table, &config.stations);
    model.save(&out_dir.join("model.json"))?;

    info!(
        rows = table.rows.len(),
        out_dir = %out_dir.display(),
        "Build complete"
    );
    Ok(())
}

/// Generates inference features from persisted artifacts and runs the
/// baseline predictor over them.
fn predict(
    config: &PipelineConfig,
    artifacts: &Path,
    target: QueryTarget,
    start: NaiveDate,
    end: NaiveDate,
    output: &Path,
) -> Result<()> {
    let scalers = CoordinateScalers::load(&artifacts.join("scalers.json"))
        .context("loading persisted scalers; run `crowdcast build` first")?;
    let context = PredictionContext::load(&artifacts.join("reference.json"))?;
    let model = MeanPredictor::load(&artifacts.join("model.json"))?;

    let generated = generate_features(
        &context,
        &scalers,
        &config.bounds,
        std::slice::from_ref(&target),
        start,
        end,
    );
    if generated.rows.is_empty() {
        bail!("no prediction rows were generated");
    }

    let input = ModelInput::from_feature_rows(&context.station_names(), &generated.rows);
    let values = run_predictor(&model, &input)?;

    write_predictions(output, &generated.rows, &values)?;
    info!(rows = generated.rows.len(), output = %output.display(), "Prediction complete");
    Ok(())
}

/// Prints each configured sensor with its observation count, covered date
/// range, and coordinate envelope.
fn list_sensors(config: &PipelineConfig, counts: &Path, coordinates: &Path) -> Result<()> {
    let observations = load_sensor_observations(counts, coordinates, config)?;

    for alias in &config.sensors {
        let rows: Vec<_> = observations
            .iter()
            .filter(|o| o.sensor_id == alias.id)
            .collect();
        if rows.is_empty() {
            info!(sensor = %alias.id, "No observations");
            continue;
        }

        let first = rows.iter().map(|o| o.time.date).min().unwrap();
        let last = rows.iter().map(|o| o.time.date).max().unwrap();
        let total: f64 = rows.iter().map(|o| o.crowdedness_count).sum();

        info!(
            sensor = %alias.id,
            observations = rows.len(),
            from = %first,
            to = %last,
            total_count = total,
            longitude = rows[0].longitude,
            latitude = rows[0].latitude,
            "Sensor"
        );
    }

    let lon_min = observations.iter().map(|o| o.longitude).fold(f64::INFINITY, f64::min);
    let lon_max = observations.iter().map(|o| o.longitude).fold(f64::NEG_INFINITY, f64::max);
    let lat_min = observations.iter().map(|o| o.latitude).fold(f64::INFINITY, f64::min);
    let lat_max = observations.iter().map(|o| o.latitude).fold(f64::NEG_INFINITY, f64::max);

    info!(
        sensors = config.sensors.len(),
        lon_min,
        lon_max,
        lat_min,
        lat_max,
        "Coordinate envelope"
    );
    Ok(())
}
