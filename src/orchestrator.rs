//! End-to-end analysis run.
//!
//! ```text
//! RawSignal ─┬─> SignalConditioner ─> FeatureExtractor ─> windows
//!            │                                              │ chronological split
//!            │                                              ├─ train ──> ModelSet::update
//!            │                                              ├─ validation ─> MSE ─> DriftMonitor
//!            │                                              └─ all ─────> ModelSet::predict
//!            └─> TraditionalMeasureEstimator ─> labels / reference ─> evaluate
//! ```
//!
//! Runs are serialized: the drift monitor lock is held from model load to the
//! final save, so two concurrent runs against one store never interleave
//! their read-modify-write of model state. Models and drift history are
//! committed only after every metric trained successfully.

use ndarray::s;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::acquisition::SignalSource;
use crate::conditioning::SignalConditioner;
use crate::config::PipelineConfig;
use crate::drift::{DriftHistory, DriftMonitor};
use crate::error::{PipelineError, Result};
use crate::evaluation;
use crate::features::{feature_matrix, FeatureExtractor};
use crate::metrics::{Metric, MetricValues};
use crate::model::{ModelSet, ModelStore};
use crate::report::{AnalysisReport, DriftReport};
use crate::signal::RawSignal;
use crate::traditional::TraditionalMeasureEstimator;

/// Index of the first validation window: floor((1 - fraction) x n), kept
/// inside [1, n - 1] so both splits are non-empty
pub fn split_index(window_count: usize, validation_fraction: f64) -> usize {
    let train = ((1.0 - validation_fraction) * window_count as f64).floor() as usize;
    train.clamp(1, window_count.saturating_sub(1).max(1))
}

/// Sequences conditioning, estimation, training, prediction and evaluation
pub struct Orchestrator<S: ModelStore> {
    config: PipelineConfig,
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
    estimator: TraditionalMeasureEstimator,
    store: S,
    drift: Mutex<DriftMonitor>,
}

impl<S: ModelStore> Orchestrator<S> {
    /// Build an orchestrator over `store`, restoring any saved drift history
    pub fn new(config: PipelineConfig, store: S) -> Result<Self> {
        config.validate()?;

        let mut monitor = DriftMonitor::from_config(&config);
        if let Some(history) = store.load_drift_history()? {
            debug!("Restored drift history for {} metrics", history.entries.len());
            monitor.restore(&history);
        }

        Ok(Self {
            conditioner: SignalConditioner::from_config(&config),
            extractor: FeatureExtractor::from_config(&config),
            estimator: TraditionalMeasureEstimator::from_config(&config),
            config,
            store,
            drift: Mutex::new(monitor),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the current drift history
    pub fn drift_history(&self) -> DriftHistory {
        self.drift.lock().unwrap_or_else(|e| e.into_inner()).export()
    }

    /// Acquire one capture from `source` and analyze it
    pub fn run_from<Src: SignalSource + ?Sized>(&self, source: &mut Src) -> Result<AnalysisReport> {
        let raw = source.acquire()?;
        self.run(&raw)
    }

    /// Analyze one capture.
    ///
    /// # Errors
    /// - `InsufficientData` / `InvalidConfig` from conditioning
    /// - `InsufficientWindows` if too few feature windows (nothing is trained)
    /// - `MissingModel` if a model is absent and fresh init is disabled
    ///   (nothing is trained)
    /// - `ModelDiverged` if a model goes non-finite while training (nothing
    ///   is persisted)
    /// - `Storage` if persisting state fails
    pub fn run(&self, raw: &RawSignal) -> Result<AnalysisReport> {
        let report = AnalysisReport::new(raw.sample_rate(), raw.len());
        info!(
            "Starting analysis run {} ({} samples @ {} Hz)",
            report.run_id,
            raw.len(),
            raw.sample_rate()
        );

        let conditioned = self.conditioner.condition(raw)?;
        let traditional = self.estimator.estimate(raw);
        info!(
            "Traditional: HR {:.2} BPM, HRV {:.2} ms, RR {:.2} br/min, amp {:.3}",
            traditional.heart_rate, traditional.hrv, traditional.resp_rate, traditional.pulse_amp
        );

        let windows = self.extractor.extract(&conditioned);
        if windows.len() < self.config.min_windows {
            return Err(PipelineError::InsufficientWindows {
                required: self.config.min_windows,
                actual: windows.len(),
            });
        }

        let features = feature_matrix(&windows);
        let split = split_index(windows.len(), self.config.validation_fraction);
        let train = features.slice(s![..split, ..]);
        let validation = features.slice(s![split.., ..]);
        debug!("Split {} windows into {} train / {} validation", windows.len(), split, windows.len() - split);

        // Held until state is persisted
        let mut drift = self.drift.lock().unwrap_or_else(|e| e.into_inner());

        let mut models = ModelSet::load(&self.store, &self.config.regressor, self.config.create_missing_models)?;
        let mut next_drift = drift.clone();
        let mut drift_reports = BTreeMap::new();

        for metric in Metric::ALL {
            let target = traditional.get(metric);
            models.update(metric, train, target)?;
            let mse = models.validation_mse(metric, validation, target)?;
            let status = next_drift.record(metric, mse);
            if status.is_drifting() {
                warn!("Concept drift detected for {} (validation MSE {:.4})", metric, mse);
            }
            drift_reports.insert(metric, DriftReport { status, validation_mse: mse });
        }

        let mut predictions = MetricValues::default();
        for metric in Metric::ALL {
            predictions.set(metric, models.predict(metric, features.view())?);
        }
        let evaluation = evaluation::evaluate(&predictions, &traditional);

        models.save(&self.store)?;
        self.store.save_drift_history(&next_drift.export())?;
        *drift = next_drift;
        drop(drift);

        let mut report = report.complete(&traditional, &predictions, &evaluation, drift_reports);
        report.window_count = windows.len();
        report.train_windows = split;
        report.validation_windows = windows.len() - split;

        info!(
            "Run {} complete in {} ms: ML HR {:.2}, HRV {:.2}, RR {:.2}, amp {:.3}",
            report.run_id,
            report.duration_ms(),
            predictions.heart_rate,
            predictions.hrv,
            predictions.resp_rate,
            predictions.pulse_amp
        );
        Ok(report)
    }
}
