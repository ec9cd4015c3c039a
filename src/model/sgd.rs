//! Linear regressor trained by stochastic gradient descent.
//!
//! Squared loss, L2 penalty, inverse-scaling learning rate
//! `eta = eta0 / t^power_t` where `t` counts every sample ever seen
//! (starting at 1), so the step size keeps shrinking across runs.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Regressor hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdParams {
    /// Initial learning rate
    pub eta0: f64,
    /// Learning-rate decay exponent
    pub power_t: f64,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for SgdParams {
    fn default() -> Self {
        Self {
            eta0: 0.01,
            power_t: 0.25,
            alpha: 1e-4,
        }
    }
}

impl SgdParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.eta0.is_finite() && self.eta0 > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "regressor eta0 must be positive, got {}",
                self.eta0
            )));
        }
        if !(self.power_t.is_finite() && self.power_t >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "regressor power_t must be non-negative, got {}",
                self.power_t
            )));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "regressor alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Persistable regressor state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdRegressor {
    pub params: SgdParams,
    pub weights: Vec<f64>,
    pub intercept: f64,
    /// Learning-rate clock (samples seen + 1)
    pub t: f64,
}

impl SgdRegressor {
    pub fn new(n_features: usize, params: SgdParams) -> Self {
        Self {
            params,
            weights: vec![0.0; n_features],
            intercept: 0.0,
            t: 1.0,
        }
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn learning_rate(&self) -> f64 {
        self.params.eta0 / self.t.powf(self.params.power_t)
    }

    pub fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.weights
            .iter()
            .zip(x.iter())
            .map(|(w, xi)| w * xi)
            .sum::<f64>()
            + self.intercept
    }

    /// One gradient step on a single (already scaled) sample
    pub fn partial_fit_row(&mut self, x: ArrayView1<'_, f64>, target: f64) {
        let eta = self.learning_rate();
        let residual = self.predict_row(x) - target;
        let decay = 1.0 - eta * self.params.alpha;

        for (w, xi) in self.weights.iter_mut().zip(x.iter()) {
            *w = *w * decay - eta * residual * xi;
        }
        self.intercept -= eta * residual;
        self.t += 1.0;
    }

    pub fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}
