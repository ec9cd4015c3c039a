use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Ordered light-intensity samples at a known sample rate.
///
/// Immutable once built; both analysis paths read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl RawSignal {
    /// Create a raw signal, rejecting empty input, non-finite samples
    /// and non-positive sample rates
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PipelineError::InvalidSignal(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if samples.is_empty() {
            return Err(PipelineError::InvalidSignal(
                "signal has no samples".to_string(),
            ));
        }
        if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::InvalidSignal(format!(
                "sample {} is not finite",
                idx
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Signal duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }
}

/// Band-passed, zero-mean, unit-variance version of a [`RawSignal`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSignal {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl ConditionedSignal {
    pub(crate) fn new(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
