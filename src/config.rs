//! Pipeline configuration, loaded once from a JSON file and passed by
//! reference into each component.
//!
//! ```json
//! {
//!   "stations": ["Nieuwmarkt", "Dam"],
//!   "sensors": [
//!     {"id": "GAWW-02", "aliases": ["2", "02R", "2R", "Oude Kennissteeg Occ wifi"]},
//!     {"id": "GAWW-03", "aliases": ["3", "03R"]}
//!   ],
//!   "bounds": {"lon_min": 4.88, "lon_max": 4.92, "lat_min": 52.36, "lat_max": 52.39},
//!   "events": {"start": "2018-03-11", "end": "2019-04-30"},
//!   "gamma": 0.5
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;
use crate::spatial::kernel::DEFAULT_GAMMA;

/// A canonical sensor id together with the raw source labels that map to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorAlias {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Geographic bounding box for event filtering and custom-point validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        longitude >= self.lon_min
            && longitude <= self.lon_max
            && latitude >= self.lat_min
            && latitude <= self.lat_max
    }
}

/// Date window for which events are considered relevant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// All user-tunable parameters of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ordered list of reference stations included in spatial features.
    pub stations: Vec<String>,
    /// Canonical sensors and their alias groups.
    pub sensors: Vec<SensorAlias>,
    pub bounds: BoundingBox,
    pub events: EventWindow,
    /// RBF kernel bandwidth.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

fn default_gamma() -> f64 {
    DEFAULT_GAMMA
}

impl PipelineConfig {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(
            stations = config.stations.len(),
            sensors = config.sensors.len(),
            gamma = config.gamma,
            "Loaded pipeline config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.stations.is_empty() {
            return Err(PipelineError::Config("station list is empty".into()));
        }
        if self.sensors.is_empty() {
            return Err(PipelineError::Config("sensor list is empty".into()));
        }
        if self.bounds.lon_min >= self.bounds.lon_max
            || self.bounds.lat_min >= self.bounds.lat_max
        {
            return Err(PipelineError::Config(format!(
                "inverted bounding box: {:?}",
                self.bounds
            )));
        }
        if self.events.start > self.events.end {
            return Err(PipelineError::Config(
                "event window start is after its end".into(),
            ));
        }
        if self.gamma <= 0.0 {
            return Err(PipelineError::Config(format!(
                "kernel gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    /// Resolves a raw source label to its canonical sensor id, if the label
    /// names a configured sensor either directly or through an alias.
    pub fn canonical_sensor(&self, raw: &str) -> Option<&str> {
        self.sensors
            .iter()
            .find(|s| s.id == raw || s.aliases.iter().any(|a| a == raw))
            .map(|s| s.id.as_str())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> PipelineConfig {
        PipelineConfig {
            stations: vec!["Nieuwmarkt".into(), "Dam".into()],
            sensors: vec![
                SensorAlias {
                    id: "GAWW-02".into(),
                    aliases: vec!["2".into(), "02R".into(), "2R".into()],
                },
                SensorAlias {
                    id: "GAWW-03".into(),
                    aliases: vec!["3".into(), "03R".into()],
                },
            ],
            bounds: BoundingBox {
                lon_min: 4.88,
                lon_max: 4.92,
                lat_min: 52.36,
                lat_max: 52.39,
            },
            events: EventWindow {
                start: NaiveDate::from_ymd_opt(2018, 3, 11).unwrap(),
                end: NaiveDate::from_ymd_opt(2019, 4, 30).unwrap(),
            },
            gamma: DEFAULT_GAMMA,
        }
    }

    #[test]
    fn test_canonical_sensor_resolves_aliases() {
        let config = test_config();
        assert_eq!(config.canonical_sensor("02R"), Some("GAWW-02"));
        assert_eq!(config.canonical_sensor("3"), Some("GAWW-03"));
        assert_eq!(config.canonical_sensor("GAWW-02"), Some("GAWW-02"));
        assert_eq!(config.canonical_sensor("GAWW-99"), None);
    }

    #[test]
    fn test_bounding_box_contains() {
        let config = test_config();
        assert!(config.bounds.contains(4.9, 52.37));
        assert!(!config.bounds.contains(4.5, 52.37));
        assert!(!config.bounds.contains(4.9, 52.5));
    }

    #[test]
    fn test_validate_rejects_empty_stations() {
        let mut config = test_config();
        config.stations.clear();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = test_config();
        config.bounds.lon_min = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_gamma() {
        let mut config = test_config();
        config.gamma = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_round_trip() {
        let path = std::env::temp_dir().join("crowdcast_test_config.json");
        let _ = std::fs::remove_file(&path);

        let config = test_config();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();

        assert_eq!(loaded.stations, config.stations);
        assert_eq!(loaded.gamma, config.gamma);

        std::fs::remove_file(&path).unwrap();
    }
}
