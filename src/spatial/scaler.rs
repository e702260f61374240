//! Linear standardization of longitude and latitude.
//!
//! The two axes are fit independently, exactly once per pipeline run, over
//! the union of sensor and station coordinates entering the fused table.
//! The fitted state is persisted as JSON and reused verbatim by every later
//! prediction invocation; refitting at inference time would silently shift
//! the feature distribution under the trained model.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;

/// Fitted mean/scale pair for one coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: f64,
    pub scale: f64,
}

impl ScalerState {
    /// Fits mean and population standard deviation (ddof = 0) over `values`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::DegenerateScaler`] when the input is empty or all
    /// values are identical; a zero scale cannot standardize anything.
    pub fn fit(axis: &'static str, values: &[f64]) -> Result<Self, PipelineError> {
        if values.is_empty() {
            return Err(PipelineError::DegenerateScaler { axis, count: 0 });
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let scale = variance.sqrt();
        if scale == 0.0 {
            return Err(PipelineError::DegenerateScaler {
                axis,
                count: values.len(),
            });
        }
        Ok(ScalerState { mean, scale })
    }

    /// Standardizes a value: `(v - mean) / scale`.
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    /// Undoes [`transform`](Self::transform).
    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }
}

/// The independently-fitted longitude and latitude scalers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateScalers {
    pub longitude: ScalerState,
    pub latitude: ScalerState,
}

impl CoordinateScalers {
    /// Fits both axes over the given coordinate values.
    pub fn fit(longitudes: &[f64], latitudes: &[f64]) -> Result<Self, PipelineError> {
        Ok(CoordinateScalers {
            longitude: ScalerState::fit("longitude", longitudes)?,
            latitude: ScalerState::fit("latitude", latitudes)?,
        })
    }

    /// Standardizes a (longitude, latitude) pair.
    pub fn transform(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        (
            self.longitude.transform(longitude),
            self.latitude.transform(latitude),
        )
    }

    /// Persists both fitted states as JSON at `path`.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved coordinate scalers");
        Ok(())
    }

    /// Restores a previously-saved pair. The deserialized floats are the
    /// exact IEEE-754 doubles that were written.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_fit_mean_and_population_stddev() {
        let s = ScalerState::fit("longitude", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((s.mean - 2.5).abs() < 1e-12);
        // population stddev of 1..4 = sqrt(1.25)
        assert!((s.scale - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_round_trip() {
        let s = ScalerState::fit("latitude", &[52.36, 52.37, 52.39]).unwrap();
        let v = 52.372;
        assert!((s.inverse(s.transform(v)) - v).abs() < 1e-9);
    }

    #[test]
    fn test_fit_rejects_identical_values() {
        let err = ScalerState::fit("longitude", &[4.9, 4.9, 4.9]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateScaler {
                axis: "longitude",
                count: 3
            }
        ));
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        assert!(ScalerState::fit("latitude", &[]).is_err());
    }

    #[test]
    fn test_save_load_restores_exact_state() {
        let path = env::temp_dir().join("crowdcast_test_scalers.json");
        let _ = fs::remove_file(&path);

        let scalers = CoordinateScalers::fit(
            &[4.88, 4.90, 4.92, 4.895],
            &[52.36, 52.37, 52.38, 52.39],
        )
        .unwrap();
        scalers.save(&path).unwrap();
        let restored = CoordinateScalers::load(&path).unwrap();

        assert_eq!(scalers, restored);

        fs::remove_file(&path).unwrap();
    }
}
