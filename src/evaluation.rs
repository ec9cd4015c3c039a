//! Comparison of model predictions against the traditional measures.
//!
//! One prediction and one reference value per metric per run, so the
//! numbers describe a single observation rather than a sample statistic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::{round2, Metric, MetricValues};

/// Error figures for one metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricEvaluation {
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// |truth - prediction| / truth x 100, or 0 when truth is 0
    pub relative_error: f64,
}

impl MetricEvaluation {
    pub fn rounded(&self) -> Self {
        Self {
            mae: round2(self.mae),
            mse: round2(self.mse),
            relative_error: round2(self.relative_error),
        }
    }
}

pub type Evaluation = BTreeMap<Metric, MetricEvaluation>;

/// Compare a single prediction with a single reference value
pub fn evaluate_metric(prediction: f64, truth: f64) -> MetricEvaluation {
    let diff = truth - prediction;
    let relative_error = if truth == 0.0 {
        0.0
    } else {
        diff.abs() / truth.abs() * 100.0
    };

    MetricEvaluation {
        mae: diff.abs(),
        mse: diff * diff,
        relative_error,
    }
}

/// Evaluate every metric
pub fn evaluate(predictions: &MetricValues, truths: &MetricValues) -> Evaluation {
    Metric::ALL
        .into_iter()
        .map(|metric| {
            (
                metric,
                evaluate_metric(predictions.get(metric), truths.get(metric)),
            )
        })
        .collect()
}

/// Round every entry to 2 decimals for reporting
pub fn rounded(evaluation: &Evaluation) -> Evaluation {
    evaluation
        .iter()
        .map(|(metric, result)| (*metric, result.rounded()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_for_one_metric() {
        let e = evaluate_metric(70.0, 72.0);
        assert_eq!(e.mae, 2.0);
        assert_eq!(e.mse, 4.0);
        assert!((e.relative_error - 2.0 / 72.0 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_truth_has_zero_relative_error() {
        for prediction in [0.0, 3.5, -12.0, 1e6] {
            let e = evaluate_metric(prediction, 0.0);
            assert_eq!(e.relative_error, 0.0);
            assert_eq!(e.mae, prediction.abs());
        }
    }

    #[test]
    fn test_evaluate_covers_all_metrics_and_is_pure() {
        let predictions = MetricValues {
            heart_rate: 70.0,
            hrv: 45.0,
            resp_rate: 3.0,
            pulse_amp: 1.9,
        };
        let truths = MetricValues {
            heart_rate: 72.0,
            hrv: 50.0,
            resp_rate: 0.0,
            pulse_amp: 2.0,
        };

        let first = evaluate(&predictions, &truths);
        let second = evaluate(&predictions, &truths);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(first[&Metric::Hrv].mae, 5.0);
        assert_eq!(first[&Metric::RespRate].relative_error, 0.0);
    }

    #[test]
    fn test_rounding() {
        let e = evaluate_metric(1.0, 3.0);
        let r = e.rounded();
        assert_eq!(r.relative_error, 66.67);
        assert_eq!(r.mae, 2.0);
    }
}
