//! Error taxonomy for the pipeline.
//!
//! Parsing and joining failures abort a run; bounds violations during
//! prediction are collected per offending point while valid points proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A raw date or hour value matched none of the accepted formats.
    #[error("unparseable {kind} value {value:?}")]
    Parse {
        /// What was being parsed ("date" or "hour").
        kind: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// A coordinate axis had zero standard deviation at fit time.
    #[error("degenerate {axis} scaler input: all {count} values identical")]
    DegenerateScaler { axis: &'static str, count: usize },

    /// A user-supplied prediction coordinate fell outside the bounding box.
    #[error("coordinates ({longitude}, {latitude}) outside configured bounding box")]
    OutOfBounds { longitude: f64, latitude: f64 },

    /// Generated feature columns differ from what the model was trained on.
    #[error("feature schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Invalid or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Parse`] on a date value.
    pub fn bad_date(value: &str) -> Self {
        PipelineError::Parse {
            kind: "date",
            value: value.to_string(),
        }
    }

    /// Shorthand for a [`PipelineError::Parse`] on an hour value.
    pub fn bad_hour(value: &str) -> Self {
        PipelineError::Parse {
            kind: "hour",
            value: value.to_string(),
        }
    }
}
