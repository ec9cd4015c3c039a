//! Error types for the analysis pipeline.
//!
//! Every failure a run can surface has its own variant so callers can
//! render distinguishable messages. Degenerate DSP cases (no peaks, empty
//! respiratory band) are not errors and never show up here.

use std::path::PathBuf;
use thiserror::Error;

use crate::metrics::Metric;

/// Errors that abort an analysis run or a model operation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Insufficient windows: need at least {required} feature windows, got {actual}")]
    InsufficientWindows { required: usize, actual: usize },

    #[error("Model for '{0}' not found and fresh initialization is disabled")]
    MissingModel(Metric),

    #[error("Model for '{0}' has not been trained yet")]
    UntrainedModel(Metric),

    #[error("Empty feature batch for '{0}'")]
    EmptyBatch(Metric),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    FeatureDimension { expected: usize, actual: usize },

    #[error("Model for '{0}' diverged (non-finite weights)")]
    ModelDiverged(Metric),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Model storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Errors raised by signal sources
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid sample on line {line}: {value:?}")]
    Parse { line: usize, value: String },

    #[error("Signal source produced no samples")]
    Empty,

    #[error("Signal source produced an invalid capture: {0}")]
    InvalidCapture(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),
}

/// Errors raised by model storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt state file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_distinct() {
        let data = PipelineError::InsufficientData {
            required: 16,
            actual: 3,
        };
        let windows = PipelineError::InsufficientWindows {
            required: 5,
            actual: 2,
        };
        let missing = PipelineError::MissingModel(Metric::Hrv);

        assert_eq!(
            data.to_string(),
            "Insufficient data: need at least 16 samples, got 3"
        );
        assert!(windows.to_string().contains("feature windows"));
        assert!(missing.to_string().contains("'hrv'"));
    }

    #[test]
    fn test_acquisition_error_converts() {
        let err: PipelineError = AcquisitionError::Empty.into();
        assert!(matches!(err, PipelineError::Acquisition(AcquisitionError::Empty)));
    }
}
