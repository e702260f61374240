//! The model seam.
//!
//! Training and hyperparameter search live outside this crate; the
//! pipeline only needs something that maps a feature matrix to predicted
//! counts. The schema check runs before any predictor is invoked so a
//! train/serve drift surfaces as a typed error here instead of failing
//! opaquely inside a model.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;
use crate::fusion::features::{FeatureRow, check_schema, model_columns};
use crate::fusion::FusedTable;

/// A feature matrix in model-input form: identifier columns and the label
/// already stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ModelInput {
    /// Converts feature rows for the stations they were built against.
    pub fn from_feature_rows(stations: &[String], rows: &[FeatureRow]) -> Self {
        ModelInput {
            columns: model_columns(stations),
            rows: rows.iter().map(FeatureRow::model_input).collect(),
        }
    }
}

/// A fitted crowdedness predictor.
pub trait Predictor {
    /// The exact column set the model was trained on.
    fn expected_columns(&self) -> &[String];

    /// Predicts one value per input row. Inputs have already passed the
    /// schema check.
    fn predict(&self, input: &ModelInput) -> Vec<f64>;
}

/// Checks feature-schema parity, then runs the predictor.
///
/// # Errors
///
/// [`PipelineError::SchemaMismatch`] when the generated columns differ
/// from what the model expects.
pub fn run_predictor(
    model: &dyn Predictor,
    input: &ModelInput,
) -> Result<Vec<f64>, PipelineError> {
    check_schema(model.expected_columns(), &input.columns)?;
    Ok(model.predict(input))
}

/// Baseline predictor: the mean crowdedness count of the training table.
/// Stands in for externally-trained models in tests and smoke runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanPredictor {
    pub mean: f64,
    pub columns: Vec<String>,
}

impl MeanPredictor {
    /// Fits the baseline on a fused training table.
    pub fn fit(table: &FusedTable, stations: &[String]) -> Self {
        let labels: Vec<f64> = table
            .rows
            .iter()
            .filter_map(|r| r.crowdedness_count)
            .collect();
        let mean = if labels.is_empty() {
            0.0
        } else {
            labels.iter().sum::<f64>() / labels.len() as f64
        };
        info!(mean, rows = labels.len(), "Fitted baseline predictor");
        MeanPredictor {
            mean,
            columns: model_columns(stations),
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
}

impl Predictor for MeanPredictor {
    fn expected_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict(&self, input: &ModelInput) -> Vec<f64> {
        vec![self.mean; input.rows.len()]
    }
}
