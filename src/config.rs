use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::model::SgdParams;

/// Analysis pipeline configuration
///
/// Defaults match a 30 s fingertip capture at 30 fps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: f64,
    pub duration_secs: f64,

    // Feature windows
    pub window_size: usize,
    pub stride: usize,
    pub min_windows: usize,
    pub validation_fraction: f64,

    // Drift monitoring
    pub drift_threshold: f64,
    pub drift_min_history: usize,
    pub drift_recent_window: usize,
    pub drift_history_capacity: usize,

    // Conditioning
    pub passband_low_hz: f64,
    pub passband_high_hz: f64,

    // Traditional measures
    pub smoothing_sigma: f64,
    pub min_peak_distance_secs: f64,
    pub welch_segment_len: usize,
    pub resp_band_low_hz: f64,
    pub resp_band_high_hz: f64,
    /// In-band power below this fraction of the strongest bin counts as
    /// no respiratory content
    pub resp_min_relative_power: f64,

    // Online models
    pub create_missing_models: bool,
    pub regressor: SgdParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 30.0,
            duration_secs: 30.0,
            window_size: 90,
            stride: 45,
            min_windows: 5,
            validation_fraction: 0.2,
            drift_threshold: 0.15,
            drift_min_history: 5,
            drift_recent_window: 3,
            drift_history_capacity: 50,
            passband_low_hz: 0.5,
            passband_high_hz: 4.0,
            smoothing_sigma: 2.0,
            min_peak_distance_secs: 0.5,
            welch_segment_len: 256,
            resp_band_low_hz: 0.1,
            resp_band_high_hz: 0.5,
            resp_min_relative_power: 1e-3,
            create_missing_models: false,
            regressor: SgdParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Check the values are mutually consistent
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return invalid(format!("sample_rate_hz must be positive, got {}", self.sample_rate_hz));
        }
        if !(self.duration_secs > 0.0) {
            return invalid(format!("duration_secs must be positive, got {}", self.duration_secs));
        }
        if self.stride == 0 || self.window_size <= self.stride {
            return invalid(format!(
                "window_size ({}) must exceed stride ({}) and stride must be non-zero",
                self.window_size, self.stride
            ));
        }
        if self.min_windows < 2 {
            return invalid(format!(
                "min_windows must be at least 2 to split train/validation, got {}",
                self.min_windows
            ));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return invalid(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            ));
        }
        if !(self.drift_threshold > 0.0) {
            return invalid(format!("drift_threshold must be positive, got {}", self.drift_threshold));
        }
        if self.drift_recent_window == 0 || self.drift_min_history <= self.drift_recent_window {
            return invalid(format!(
                "drift_min_history ({}) must exceed drift_recent_window ({})",
                self.drift_min_history, self.drift_recent_window
            ));
        }
        if self.drift_history_capacity < self.drift_min_history {
            return invalid(format!(
                "drift_history_capacity ({}) must hold at least drift_min_history ({}) entries",
                self.drift_history_capacity, self.drift_min_history
            ));
        }
        if !(self.resp_band_low_hz >= 0.0 && self.resp_band_low_hz < self.resp_band_high_hz) {
            return invalid(format!(
                "respiratory band ({}, {}) is empty",
                self.resp_band_low_hz, self.resp_band_high_hz
            ));
        }
        if self.welch_segment_len < 2 {
            return invalid(format!("welch_segment_len must be >= 2, got {}", self.welch_segment_len));
        }
        self.regressor.validate()
    }

    /// Samples expected from one capture
    pub fn expected_samples(&self) -> usize {
        (self.sample_rate_hz * self.duration_secs).round() as usize
    }
}

/// Application configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Directory for persisted model state
    pub model_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            pipeline: PipelineConfig::default(),
            model_dir: None,
        }
    }
}

impl AppConfig {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            serde_json::from_str(&content)
                .context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, content)
            .context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")?;
        Ok(home.join(".ppganalyzer"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the model state directory
    pub fn get_model_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.model_dir {
            Ok(dir.clone())
        } else {
            Ok(Self::default_config_dir()?.join("models"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_rate_hz, 30.0);
        assert_eq!(config.window_size, 90);
        assert_eq!(config.stride, 45);
        assert_eq!(config.min_windows, 5);
        assert_eq!(config.validation_fraction, 0.2);
        assert_eq!(config.drift_threshold, 0.15);
        assert_eq!(config.expected_samples(), 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_overlapping_windows() {
        let config = PipelineConfig {
            stride: 90,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_validation_fraction() {
        for fraction in [0.0, 1.0, -0.2] {
            let config = PipelineConfig {
                validation_fraction: fraction,
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_short_drift_history() {
        let config = PipelineConfig {
            drift_min_history: 3,
            drift_recent_window: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.pipeline.drift_threshold = 0.25;
        config.model_dir = Some(dir.path().join("models"));
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.pipeline, config.pipeline);
        assert_eq!(loaded.get_model_dir().unwrap(), dir.path().join("models"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.schema_version, 1);
        assert_eq!(loaded.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_partial_pipeline_section_uses_defaults() {
        let json = r#"{"schema_version": 1, "pipeline": {"stride": 30}, "model_dir": null}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.stride, 30);
        assert_eq!(config.pipeline.window_size, 90);
    }
}
