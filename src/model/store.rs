//! Model state storage, keyed by metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::ModelState;
use crate::drift::DriftHistory;
use crate::error::StoreError;
use crate::metrics::Metric;

/// Current schema version for stored model files
const SCHEMA_VERSION: u32 = 1;

/// Backing storage for per-metric model state and drift history
pub trait ModelStore: Send + Sync {
    /// Stored state for `metric`, or `None` if never saved
    fn load(&self, metric: Metric) -> Result<Option<ModelState>, StoreError>;

    fn save(&self, metric: Metric, state: &ModelState) -> Result<(), StoreError>;

    fn load_drift_history(&self) -> Result<Option<DriftHistory>, StoreError> {
        Ok(None)
    }

    fn save_drift_history(&self, _history: &DriftHistory) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local store (tests and embedding)
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    models: Mutex<BTreeMap<Metric, ModelState>>,
    drift: Mutex<Option<DriftHistory>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self, metric: Metric) -> Result<Option<ModelState>, StoreError> {
        let models = self.models.lock().unwrap_or_else(|e| e.into_inner());
        Ok(models.get(&metric).cloned())
    }

    fn save(&self, metric: Metric, state: &ModelState) -> Result<(), StoreError> {
        let mut models = self.models.lock().unwrap_or_else(|e| e.into_inner());
        models.insert(metric, state.clone());
        Ok(())
    }

    fn load_drift_history(&self) -> Result<Option<DriftHistory>, StoreError> {
        let drift = self.drift.lock().unwrap_or_else(|e| e.into_inner());
        Ok(drift.clone())
    }

    fn save_drift_history(&self, history: &DriftHistory) -> Result<(), StoreError> {
        let mut drift = self.drift.lock().unwrap_or_else(|e| e.into_inner());
        *drift = Some(history.clone());
        Ok(())
    }
}

/// On-disk envelope for a model file
#[derive(Debug, Serialize, Deserialize)]
struct StoredModel {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    state: ModelState,
}

/// On-disk envelope for the drift history file
#[derive(Debug, Serialize, Deserialize)]
struct StoredDriftHistory {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    history: DriftHistory,
}

/// JSON files in one directory: `<metric>_model.json` per metric plus
/// `drift_history.json`
#[derive(Debug, Clone)]
pub struct JsonFileModelStore {
    dir: PathBuf,
}

impl JsonFileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, metric: Metric) -> PathBuf {
        self.dir.join(format!("{}_model.json", metric.key()))
    }

    pub fn drift_history_path(&self) -> PathBuf {
        self.dir.join("drift_history.json")
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Atomic write: write to temp file, then rename
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(value)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
        std::fs::rename(&temp_path, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ModelStore for JsonFileModelStore {
    fn load(&self, metric: Metric) -> Result<Option<ModelState>, StoreError> {
        let path = self.model_path(metric);
        let Some(stored) = Self::read_json::<StoredModel>(&path)? else {
            debug!("No model file at {:?}", path);
            return Ok(None);
        };

        if stored.schema_version != SCHEMA_VERSION {
            warn!(
                "Model file schema version mismatch: {} vs {}, may need migration",
                stored.schema_version, SCHEMA_VERSION
            );
        }
        debug!("Loaded {} model saved at {}", metric, stored.saved_at);
        Ok(Some(stored.state))
    }

    fn save(&self, metric: Metric, state: &ModelState) -> Result<(), StoreError> {
        let path = self.model_path(metric);
        let stored = StoredModel {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        self.write_json(&path, &stored)?;
        info!("Saved {} model to {:?}", metric, path);
        Ok(())
    }

    fn load_drift_history(&self) -> Result<Option<DriftHistory>, StoreError> {
        Ok(Self::read_json::<StoredDriftHistory>(&self.drift_history_path())?
            .map(|stored| stored.history))
    }

    fn save_drift_history(&self, history: &DriftHistory) -> Result<(), StoreError> {
        let stored = StoredDriftHistory {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            history: history.clone(),
        };
        self.write_json(&self.drift_history_path(), &stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OnlineMetricModel, SgdParams};
    use tempfile::tempdir;

    fn trained_state(metric: Metric) -> ModelState {
        let mut model = OnlineMetricModel::fresh(metric, SgdParams::default());
        let batch = ndarray::Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as f64);
        model.update(batch.view(), 10.0).unwrap();
        model.into_state()
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonFileModelStore::new(dir.path().join("models"));

        assert!(store.load(Metric::Hrv).unwrap().is_none());

        let state = trained_state(Metric::Hrv);
        store.save(Metric::Hrv, &state).unwrap();
        assert!(store.model_path(Metric::Hrv).ends_with("hrv_model.json"));
        assert!(!store.model_path(Metric::Hrv).with_extension("json.tmp").exists());

        let loaded = store.load(Metric::Hrv).unwrap().unwrap();
        assert_eq!(loaded.metric, Metric::Hrv);
        assert_eq!(loaded.updates, 1);
        assert_eq!(loaded.regressor.t, state.regressor.t);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = JsonFileModelStore::new(dir.path());
        std::fs::write(store.model_path(Metric::PulseAmp), "{not json").unwrap();

        let err = store.load(Metric::PulseAmp).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_drift_history_persistence() {
        let dir = tempdir().unwrap();
        let store = JsonFileModelStore::new(dir.path());
        assert!(store.load_drift_history().unwrap().is_none());

        let mut history = DriftHistory::default();
        history.entries.insert(Metric::HeartRate, vec![1.0, 2.0]);
        store.save_drift_history(&history).unwrap();

        assert_eq!(store.load_drift_history().unwrap(), Some(history));
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryModelStore::new();
        assert!(store.is_empty());
        store.save(Metric::RespRate, &trained_state(Metric::RespRate)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.load(Metric::RespRate).unwrap().is_some());
        assert!(store.load(Metric::HeartRate).unwrap().is_none());
    }
}
