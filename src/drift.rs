//! Validation-error drift monitoring.
//!
//! Each run appends one validation MSE per metric. Once enough history
//! exists, the mean of the most recent entries is compared against the mean
//! of everything before them; a relative change above the threshold flags
//! the metric as drifting. The result only annotates the run, it never
//! blocks training or prediction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::metrics::Metric;

/// Outcome of a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Stable,
    Drifting,
}

impl DriftStatus {
    pub fn is_drifting(&self) -> bool {
        matches!(self, Self::Drifting)
    }
}

impl std::fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Drifting => write!(f, "drifting"),
        }
    }
}

/// Persisted per-metric MSE history, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftHistory {
    pub entries: BTreeMap<Metric, Vec<f64>>,
}

/// Per-metric bounded MSE history with a trend check
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    threshold: f64,
    min_history: usize,
    recent_window: usize,
    capacity: usize,
    history: BTreeMap<Metric, VecDeque<f64>>,
}

impl DriftMonitor {
    pub fn new(threshold: f64, min_history: usize, recent_window: usize, capacity: usize) -> Self {
        Self {
            threshold,
            min_history,
            recent_window,
            capacity: capacity.max(1),
            history: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.drift_threshold,
            config.drift_min_history,
            config.drift_recent_window,
            config.drift_history_capacity,
        )
    }

    /// Append `mse` to the metric's history and check for drift
    pub fn record(&mut self, metric: Metric, mse: f64) -> DriftStatus {
        let capacity = self.capacity;
        let history = self.history.entry(metric).or_default();
        history.push_back(mse);
        while history.len() > capacity {
            history.pop_front();
        }

        if history.len() < self.min_history || history.len() <= self.recent_window {
            return DriftStatus::Stable;
        }

        let split = history.len() - self.recent_window;
        let baseline = history.iter().take(split).sum::<f64>() / split as f64;
        let recent = history.iter().skip(split).sum::<f64>() / self.recent_window as f64;

        // No meaningful relative change against a zero baseline
        if baseline == 0.0 {
            return DriftStatus::Stable;
        }

        let change = (recent - baseline).abs() / baseline.abs();
        debug!(
            "{} drift check: baseline {:.4}, recent {:.4}, change {:.1}%",
            metric,
            baseline,
            recent,
            change * 100.0
        );

        if change > self.threshold {
            DriftStatus::Drifting
        } else {
            DriftStatus::Stable
        }
    }

    /// Recorded history for `metric`, oldest first
    pub fn history(&self, metric: Metric) -> Vec<f64> {
        self.history
            .get(&metric)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Replace the history with a persisted one (trimmed to capacity)
    pub fn restore(&mut self, saved: &DriftHistory) {
        self.history = saved
            .entries
            .iter()
            .map(|(metric, values)| {
                let skip = values.len().saturating_sub(self.capacity);
                (*metric, values.iter().skip(skip).copied().collect())
            })
            .collect();
    }

    pub fn export(&self) -> DriftHistory {
        DriftHistory {
            entries: self
                .history
                .iter()
                .map(|(metric, values)| (*metric, values.iter().copied().collect()))
                .collect(),
        }
    }
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_four_records_are_stable() {
        let mut monitor = DriftMonitor::default();
        for mse in [1.0, 100.0, 0.01, 1000.0] {
            assert_eq!(monitor.record(Metric::HeartRate, mse), DriftStatus::Stable);
        }
    }

    #[test]
    fn test_fifth_record_detects_drift() {
        let mut monitor = DriftMonitor::default();
        for mse in [1.0, 1.0, 2.0, 2.0] {
            monitor.record(Metric::Hrv, mse);
        }
        // baseline mean(1, 1) = 1, recent mean(2, 2, 2) = 2: +100%
        assert_eq!(monitor.record(Metric::Hrv, 2.0), DriftStatus::Drifting);
    }

    #[test]
    fn test_change_at_threshold_is_stable() {
        let mut monitor = DriftMonitor::new(0.5, 5, 3, 50);
        for mse in [2.0, 2.0, 3.0, 3.0] {
            monitor.record(Metric::RespRate, mse);
        }
        // baseline 2, recent 3: exactly 50%, not above
        assert_eq!(monitor.record(Metric::RespRate, 3.0), DriftStatus::Stable);
    }

    #[test]
    fn test_metrics_are_independent() {
        let mut monitor = DriftMonitor::default();
        for _ in 0..4 {
            monitor.record(Metric::HeartRate, 1.0);
        }
        assert_eq!(monitor.record(Metric::PulseAmp, 50.0), DriftStatus::Stable);
        assert_eq!(monitor.history(Metric::PulseAmp), vec![50.0]);
    }

    #[test]
    fn test_zero_baseline_is_stable() {
        let mut monitor = DriftMonitor::default();
        for mse in [0.0, 0.0, 5.0, 5.0] {
            monitor.record(Metric::HeartRate, mse);
        }
        assert_eq!(monitor.record(Metric::HeartRate, 5.0), DriftStatus::Stable);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut monitor = DriftMonitor::new(0.15, 5, 3, 10);
        for i in 0..25 {
            monitor.record(Metric::HeartRate, i as f64);
        }
        let history = monitor.history(Metric::HeartRate);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], 15.0);
        assert_eq!(history[9], 24.0);
    }

    #[test]
    fn test_export_and_restore() {
        let mut monitor = DriftMonitor::default();
        for mse in [1.0, 1.1, 0.9] {
            monitor.record(Metric::Hrv, mse);
        }
        let saved = monitor.export();

        let mut restored = DriftMonitor::new(0.15, 5, 3, 2);
        restored.restore(&saved);
        assert_eq!(restored.history(Metric::Hrv), vec![1.1, 0.9]);

        let json = serde_json::to_string(&saved).unwrap();
        assert!(json.contains("\"hrv\""));
        let parsed: DriftHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries[&Metric::Hrv].len(), 3);
    }
}
