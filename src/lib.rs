//! Fingertip PPG analysis.
//!
//! Two paths run over every capture: a traditional estimator computes
//! heart rate, HRV, respiratory rate and pulse amplitude directly from the
//! raw trace, and a set of online regression models, trained with those
//! values as labels, predicts the same metrics from windowed features of
//! the band-passed signal. See [`Orchestrator`] for the run sequence.

pub mod acquisition;
pub mod conditioning;
pub mod config;
pub mod drift;
pub mod dsp;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod signal;
pub mod traditional;


pub use acquisition::{FileSignalSource, SignalSource, SyntheticPulseConfig, SyntheticPulseSource};
pub use conditioning::SignalConditioner;
pub use config::{AppConfig, PipelineConfig};
pub use drift::{DriftHistory, DriftMonitor, DriftStatus};
pub use error::{AcquisitionError, PipelineError, StoreError};
pub use evaluation::{evaluate, Evaluation, MetricEvaluation};
pub use features::{FeatureExtractor, FeatureVector, FeatureWindow, FEATURE_COUNT};
pub use metrics::{Metric, MetricValues, TraditionalMeasures};
pub use model::{
    InMemoryModelStore, JsonFileModelStore, ModelSet, ModelState, ModelStore, OnlineMetricModel,
    SgdParams,
};
pub use orchestrator::Orchestrator;
pub use report::{AnalysisReport, DriftReport};
pub use signal::{ConditionedSignal, RawSignal};
pub use traditional::TraditionalMeasureEstimator;
