//! Online per-metric regression models.
//!
//! Each metric owns one [`OnlineMetricModel`]: a [`StandardScaler`] fitted on
//! the first training batch it ever sees, followed by an [`SgdRegressor`]
//! that keeps adapting on every run. A run trains with one batch of window
//! features against a single run-level target, so every row in the batch
//! shares the same label.
//!
//! [`ModelSet`] groups the four models and enforces the all-or-nothing
//! load policy: either every model is available before training starts, or
//! the run fails with `MissingModel` and nothing is touched.

pub mod scaler;
pub mod sgd;
pub mod store;

pub use scaler::StandardScaler;
pub use sgd::{SgdParams, SgdRegressor};
pub use store::{InMemoryModelStore, JsonFileModelStore, ModelStore};

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::features::FEATURE_COUNT;
use crate::metrics::Metric;

/// Serializable model state, one per metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub metric: Metric,
    /// `None` until the first training batch
    pub scaler: Option<StandardScaler>,
    pub regressor: SgdRegressor,
    /// Number of `update` calls applied
    pub updates: u64,
}

/// Scaler + incremental regressor for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineMetricModel {
    state: ModelState,
}

impl OnlineMetricModel {
    /// Untrained model with zero weights
    pub fn fresh(metric: Metric, params: SgdParams) -> Self {
        Self {
            state: ModelState {
                metric,
                scaler: None,
                regressor: SgdRegressor::new(FEATURE_COUNT, params),
                updates: 0,
            },
        }
    }

    /// Restore a model from persisted state
    pub fn from_state(state: ModelState) -> Result<Self> {
        if state.regressor.n_features() != FEATURE_COUNT {
            return Err(PipelineError::FeatureDimension {
                expected: FEATURE_COUNT,
                actual: state.regressor.n_features(),
            });
        }
        if let Some(scaler) = &state.scaler {
            if scaler.n_features() != FEATURE_COUNT {
                return Err(PipelineError::FeatureDimension {
                    expected: FEATURE_COUNT,
                    actual: scaler.n_features(),
                });
            }
        }
        if !state.regressor.is_finite() {
            return Err(PipelineError::ModelDiverged(state.metric));
        }
        Ok(Self { state })
    }

    pub fn metric(&self) -> Metric {
        self.state.metric
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn into_state(self) -> ModelState {
        self.state
    }

    pub fn is_trained(&self) -> bool {
        self.state.scaler.is_some()
    }

    fn check_batch(&self, batch: &ArrayView2<'_, f64>) -> Result<()> {
        if batch.nrows() == 0 {
            return Err(PipelineError::EmptyBatch(self.state.metric));
        }
        if batch.ncols() != FEATURE_COUNT {
            return Err(PipelineError::FeatureDimension {
                expected: FEATURE_COUNT,
                actual: batch.ncols(),
            });
        }
        Ok(())
    }

    /// Train on every row of `batch` against the same `target`.
    ///
    /// The scaler is fitted on the first batch only and frozen afterwards.
    pub fn update(&mut self, batch: ArrayView2<'_, f64>, target: f64) -> Result<()> {
        self.check_batch(&batch)?;
        let metric = self.state.metric;

        if self.state.scaler.is_none() {
            debug!("Fitting {} scaler on {} rows", metric, batch.nrows());
            self.state.scaler = StandardScaler::fit(batch);
        }
        let scaler = self
            .state
            .scaler
            .as_ref()
            .ok_or(PipelineError::EmptyBatch(metric))?;

        for row in batch.rows() {
            let scaled = scaler.transform_row(row);
            self.state.regressor.partial_fit_row(scaled.view(), target);
        }

        if !self.state.regressor.is_finite() {
            return Err(PipelineError::ModelDiverged(metric));
        }
        self.state.updates += 1;

        debug!(
            "Updated {} model with {} rows (target {:.3}, update #{})",
            metric,
            batch.nrows(),
            target,
            self.state.updates
        );
        Ok(())
    }

    /// Predict one value from the mean of the batch's rows
    pub fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<f64> {
        self.check_batch(&batch)?;
        let scaler = self
            .state
            .scaler
            .as_ref()
            .ok_or(PipelineError::UntrainedModel(self.state.metric))?;

        let representative = batch
            .mean_axis(ndarray::Axis(0))
            .ok_or(PipelineError::EmptyBatch(self.state.metric))?;
        let scaled = scaler.transform_row(representative.view());
        Ok(self.state.regressor.predict_row(scaled.view()))
    }

    /// Mean squared error of per-row predictions against `target`
    pub fn validation_mse(&self, batch: ArrayView2<'_, f64>, target: f64) -> Result<f64> {
        self.check_batch(&batch)?;
        let scaler = self
            .state
            .scaler
            .as_ref()
            .ok_or(PipelineError::UntrainedModel(self.state.metric))?;

        let total: f64 = batch
            .rows()
            .into_iter()
            .map(|row| {
                let err = self.state.regressor.predict_row(scaler.transform_row(row).view()) - target;
                err * err
            })
            .sum();
        let mse = total / batch.nrows() as f64;
        if !mse.is_finite() {
            return Err(PipelineError::ModelDiverged(self.state.metric));
        }
        Ok(mse)
    }
}

/// The four per-metric models of one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSet {
    models: BTreeMap<Metric, OnlineMetricModel>,
}

impl ModelSet {
    /// Load every metric's model from `store`.
    ///
    /// Metrics without stored state get a fresh model when `allow_fresh` is
    /// set; otherwise the first missing one fails the whole load.
    pub fn load<S: ModelStore + ?Sized>(
        store: &S,
        params: &SgdParams,
        allow_fresh: bool,
    ) -> Result<Self> {
        let mut models = BTreeMap::new();
        for metric in Metric::ALL {
            let model = match store.load(metric)? {
                Some(state) => OnlineMetricModel::from_state(state)?,
                None if allow_fresh => {
                    info!("No stored model for {}, initializing fresh", metric);
                    OnlineMetricModel::fresh(metric, params.clone())
                }
                None => return Err(PipelineError::MissingModel(metric)),
            };
            models.insert(metric, model);
        }
        Ok(Self { models })
    }

    /// Fresh, untrained models for every metric
    pub fn fresh(params: &SgdParams) -> Self {
        let models = Metric::ALL
            .into_iter()
            .map(|metric| (metric, OnlineMetricModel::fresh(metric, params.clone())))
            .collect();
        Self { models }
    }

    pub fn get(&self, metric: Metric) -> Result<&OnlineMetricModel> {
        self.models
            .get(&metric)
            .ok_or(PipelineError::MissingModel(metric))
    }

    pub fn update(&mut self, metric: Metric, batch: ArrayView2<'_, f64>, target: f64) -> Result<()> {
        self.models
            .get_mut(&metric)
            .ok_or(PipelineError::MissingModel(metric))?
            .update(batch, target)
    }

    pub fn predict(&self, metric: Metric, batch: ArrayView2<'_, f64>) -> Result<f64> {
        self.get(metric)?.predict(batch)
    }

    pub fn validation_mse(&self, metric: Metric, batch: ArrayView2<'_, f64>, target: f64) -> Result<f64> {
        self.get(metric)?.validation_mse(batch, target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OnlineMetricModel> {
        self.models.values()
    }

    /// Persist every model
    pub fn save<S: ModelStore + ?Sized>(&self, store: &S) -> Result<()> {
        for model in self.models.values() {
            store.save(model.metric(), model.state())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn batch(rows: usize, offset: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, FEATURE_COUNT), |(r, c)| offset + r as f64 * 0.1 + c as f64)
    }

    #[test]
    fn test_predict_before_update_is_untrained() {
        let model = OnlineMetricModel::fresh(Metric::HeartRate, SgdParams::default());
        let err = model.predict(batch(3, 0.0).view()).unwrap_err();
        assert!(matches!(err, PipelineError::UntrainedModel(Metric::HeartRate)));
    }

    #[test]
    fn test_empty_and_misshapen_batches() {
        let mut model = OnlineMetricModel::fresh(Metric::Hrv, SgdParams::default());
        let empty = Array2::<f64>::zeros((0, FEATURE_COUNT));
        assert!(matches!(
            model.update(empty.view(), 1.0),
            Err(PipelineError::EmptyBatch(Metric::Hrv))
        ));

        let narrow = Array2::<f64>::zeros((4, 3));
        assert!(matches!(
            model.update(narrow.view(), 1.0),
            Err(PipelineError::FeatureDimension { expected: 6, actual: 3 })
        ));
    }

    #[test]
    fn test_scaler_is_fitted_once() {
        let mut model = OnlineMetricModel::fresh(Metric::PulseAmp, SgdParams::default());
        model.update(batch(8, 0.0).view(), 2.0).unwrap();
        let first = model.state().scaler.clone();

        model.update(batch(8, 50.0).view(), 2.0).unwrap();
        assert_eq!(model.state().scaler, first);
        assert_eq!(model.state().updates, 2);
        assert_eq!(model.state().regressor.t, 17.0);
    }

    #[test]
    fn test_repeated_training_approaches_target() {
        let mut model = OnlineMetricModel::fresh(Metric::HeartRate, SgdParams::default());
        let train = batch(12, 0.0);
        let before = {
            model.update(train.view(), 72.0).unwrap();
            model.validation_mse(train.view(), 72.0).unwrap()
        };
        for _ in 0..200 {
            model.update(train.view(), 72.0).unwrap();
        }
        let after = model.validation_mse(train.view(), 72.0).unwrap();
        assert!(after < before, "mse {} -> {}", before, after);

        let prediction = model.predict(train.view()).unwrap();
        assert!(prediction > 0.0 && prediction < 80.0);
    }

    #[test]
    fn test_state_round_trip_preserves_predictions() {
        let mut model = OnlineMetricModel::fresh(Metric::RespRate, SgdParams::default());
        model.update(batch(6, 1.0).view(), 15.0).unwrap();

        let json = serde_json::to_string(model.state()).unwrap();
        let restored =
            OnlineMetricModel::from_state(serde_json::from_str(&json).unwrap()).unwrap();
        let a = restored.predict(batch(6, 1.0).view()).unwrap();
        let b = model.predict(batch(6, 1.0).view()).unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_from_state_rejects_wrong_dimension() {
        let mut state = OnlineMetricModel::fresh(Metric::Hrv, SgdParams::default()).into_state();
        state.regressor.weights.pop();
        assert!(matches!(
            OnlineMetricModel::from_state(state),
            Err(PipelineError::FeatureDimension { .. })
        ));
    }

    #[test]
    fn test_model_set_missing_without_fresh_init() {
        let store = InMemoryModelStore::new();
        let err = ModelSet::load(&store, &SgdParams::default(), false).unwrap_err();
        assert!(matches!(err, PipelineError::MissingModel(Metric::HeartRate)));

        let set = ModelSet::load(&store, &SgdParams::default(), true).unwrap();
        assert_eq!(set.iter().count(), 4);
        assert!(set.iter().all(|m| !m.is_trained()));
    }

    #[test]
    fn test_model_set_partial_store_fails_on_missing_metric() {
        let store = InMemoryModelStore::new();
        let hr = OnlineMetricModel::fresh(Metric::HeartRate, SgdParams::default());
        store.save(Metric::HeartRate, hr.state()).unwrap();

        let err = ModelSet::load(&store, &SgdParams::default(), false).unwrap_err();
        assert!(matches!(err, PipelineError::MissingModel(Metric::Hrv)));
    }

    #[test]
    fn test_model_set_save_and_reload() {
        let store = InMemoryModelStore::new();
        let mut set = ModelSet::fresh(&SgdParams::default());
        for metric in Metric::ALL {
            set.update(metric, batch(5, 0.0).view(), 1.0).unwrap();
        }
        set.save(&store).unwrap();

        let reloaded = ModelSet::load(&store, &SgdParams::default(), false).unwrap();
        assert_eq!(reloaded, set);
    }
}
