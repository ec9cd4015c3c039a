use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::drift::DriftStatus;
use crate::evaluation::{self, Evaluation};
use crate::metrics::{round2, Metric, MetricValues};

/// Drift outcome for one metric in one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub status: DriftStatus,
    pub validation_mse: f64,
}

/// Result of one analysis run. Values are rounded to 2 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    // Input stats
    pub sample_rate_hz: f64,
    pub sample_count: usize,
    pub window_count: usize,
    pub train_windows: usize,
    pub validation_windows: usize,

    pub traditional: MetricValues,
    pub ml_predictions: MetricValues,
    pub evaluation: Evaluation,
    pub drift: BTreeMap<Metric, DriftReport>,
}

impl AnalysisReport {
    /// Start a report for a run beginning now
    pub fn new(sample_rate_hz: f64, sample_count: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            sample_rate_hz,
            sample_count,
            window_count: 0,
            train_windows: 0,
            validation_windows: 0,
            traditional: MetricValues::default(),
            ml_predictions: MetricValues::default(),
            evaluation: Evaluation::new(),
            drift: BTreeMap::new(),
        }
    }

    /// Fill in the results (rounding them) and stamp the finish time
    pub fn complete(
        mut self,
        traditional: &MetricValues,
        ml_predictions: &MetricValues,
        evaluation: &Evaluation,
        drift: BTreeMap<Metric, DriftReport>,
    ) -> Self {
        self.traditional = traditional.rounded();
        self.ml_predictions = ml_predictions.rounded();
        self.evaluation = evaluation::rounded(evaluation);
        self.drift = drift
            .into_iter()
            .map(|(metric, report)| {
                (
                    metric,
                    DriftReport {
                        status: report.status,
                        validation_mse: round2(report.validation_mse),
                    },
                )
            })
            .collect();
        self.finished_at = Utc::now();
        self
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Metrics whose validation error is trending away from history
    pub fn drifting_metrics(&self) -> Vec<Metric> {
        self.drift
            .iter()
            .filter(|(_, d)| d.status.is_drifting())
            .map(|(metric, _)| *metric)
            .collect()
    }

    /// Human-readable table for terminal output
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run {} ({} samples @ {} Hz, {} windows: {} train / {} validation)",
            self.run_id,
            self.sample_count,
            self.sample_rate_hz,
            self.window_count,
            self.train_windows,
            self.validation_windows
        );
        let _ = writeln!(
            out,
            "{:<11} {:>12} {:>12} {:>10} {:>12} {:>9}  {}",
            "metric", "traditional", "ml", "mae", "rel_err_%", "val_mse", "drift"
        );
        for metric in Metric::ALL {
            let eval = self.evaluation.get(&metric).copied().unwrap_or_default();
            let (status, mse) = self
                .drift
                .get(&metric)
                .map(|d| (d.status.to_string(), d.validation_mse))
                .unwrap_or_else(|| ("-".to_string(), 0.0));
            let _ = writeln!(
                out,
                "{:<11} {:>12.2} {:>12.2} {:>10.2} {:>12.2} {:>9.2}  {}",
                metric.key(),
                self.traditional.get(metric),
                self.ml_predictions.get(metric),
                eval.mae,
                eval.relative_error,
                mse,
                status
            );
        }
        out
    }
}
