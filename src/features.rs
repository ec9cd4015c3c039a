//! Sliding-window feature extraction over the conditioned signal.
//!
//! Windows of `window_size` samples start every `stride` samples from index
//! 0; a window that would run past the end is dropped (no padding). Window
//! order follows start order, which the orchestrator relies on for its
//! chronological train/validation split.

use ndarray::Array2;
use std::ops::Range;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::dsp;
use crate::signal::ConditionedSignal;

/// Number of scalar features per window
pub const FEATURE_COUNT: usize = 6;

/// Per-window features, in model input order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector {
    pub mean: f64,
    pub std_dev: f64,
    /// Frequency of the strongest DFT bin (Hz)
    pub dominant_freq_hz: f64,
    /// Sum of squared DFT magnitudes
    pub spectral_energy: f64,
    pub peak_count: f64,
    pub p75: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.mean,
            self.std_dev,
            self.dominant_freq_hz,
            self.spectral_energy,
            self.peak_count,
            self.p75,
        ]
    }
}

/// A window of the conditioned signal and its features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    /// Sample range of the window within the conditioned signal
    pub range: Range<usize>,
    pub features: FeatureVector,
}

impl FeatureWindow {
    /// The samples this window covers
    pub fn samples<'a>(&self, signal: &'a ConditionedSignal) -> &'a [f64] {
        &signal.samples()[self.range.clone()]
    }
}

/// Sliding-window feature extractor
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window_size: usize,
    stride: usize,
}

impl FeatureExtractor {
    pub fn new(window_size: usize, stride: usize) -> Self {
        Self {
            window_size,
            stride,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.window_size, config.stride)
    }

    /// Number of windows a signal of `len` samples yields
    pub fn window_count(&self, len: usize) -> usize {
        if self.stride == 0 || len < self.window_size {
            return 0;
        }
        (len - self.window_size) / self.stride + 1
    }

    /// Compute features for every full window of `signal`.
    ///
    /// Returns an empty vector when the signal is shorter than one window.
    pub fn extract(&self, signal: &ConditionedSignal) -> Vec<FeatureWindow> {
        let count = self.window_count(signal.len());
        let sample_rate = signal.sample_rate();

        let windows: Vec<FeatureWindow> = (0..count)
            .map(|i| {
                let start = i * self.stride;
                let range = start..start + self.window_size;
                let features = window_features(&signal.samples()[range.clone()], sample_rate);
                FeatureWindow { range, features }
            })
            .collect();

        debug!(
            "Extracted {} windows (size {}, stride {}) from {} samples",
            windows.len(),
            self.window_size,
            self.stride,
            signal.len()
        );

        windows
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Features of a single window
pub fn window_features(window: &[f64], sample_rate: f64) -> FeatureVector {
    let magnitudes = dsp::dft_magnitudes(window);

    FeatureVector {
        mean: dsp::mean(window),
        std_dev: dsp::std_dev(window),
        dominant_freq_hz: dsp::dominant_frequency(&magnitudes, sample_rate),
        spectral_energy: magnitudes.iter().map(|m| m * m).sum(),
        peak_count: dsp::local_maxima(window).len() as f64,
        p75: dsp::percentile(window, 75.0),
    }
}

/// Stack window features into a `(windows, FEATURE_COUNT)` matrix
pub fn feature_matrix(windows: &[FeatureWindow]) -> Array2<f64> {
    let mut matrix = Array2::zeros((windows.len(), FEATURE_COUNT));
    for (mut row, window) in matrix.rows_mut().into_iter().zip(windows) {
        for (dst, value) in row.iter_mut().zip(window.features.to_array()) {
            *dst = value;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn conditioned(samples: Vec<f64>) -> ConditionedSignal {
        ConditionedSignal::new(samples, 30.0)
    }

    #[test]
    fn test_window_count_for_default_capture() {
        let extractor = FeatureExtractor::default();
        // (900 - 90) / 45 + 1
        assert_eq!(extractor.window_count(900), 19);
        assert_eq!(extractor.window_count(90), 1);
        assert_eq!(extractor.window_count(89), 0);
    }

    #[test]
    fn test_default_follows_config() {
        let config = PipelineConfig {
            window_size: 60,
            stride: 30,
            ..Default::default()
        };
        let default = FeatureExtractor::default();
        let configured = FeatureExtractor::from_config(&config);
        let base = PipelineConfig::default();

        assert_eq!(default.window_count(900), (900 - base.window_size) / base.stride + 1);
        assert_eq!(configured.window_count(900), 29);
    }

    #[test]
    fn test_short_signal_gives_no_windows() {
        let windows = FeatureExtractor::default().extract(&conditioned(vec![0.0; 60]));
        assert!(windows.is_empty());
    }

    #[test]
    fn test_windows_are_in_temporal_order() {
        let windows = FeatureExtractor::default().extract(&conditioned(vec![0.0; 300]));
        assert_eq!(windows.len(), 5);
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.range, i * 45..i * 45 + 90);
        }
    }

    #[test]
    fn test_window_features_of_sine() {
        // 2 Hz over 90 samples at 30 Hz: exactly 6 cycles
        let window: Vec<f64> = (0..90)
            .map(|i| (2.0 * PI * 2.0 * i as f64 / 30.0).sin())
            .collect();
        let f = window_features(&window, 30.0);

        assert!(f.mean.abs() < 1e-9);
        assert!((f.std_dev - (0.5f64).sqrt()).abs() < 1e-9);
        assert!((f.dominant_freq_hz - 2.0).abs() < 1e-9);
        // Parseval: sum |X|^2 = N * sum x^2 = 90 * 45
        assert!((f.spectral_energy - 4050.0).abs() < 1e-6);
        assert_eq!(f.peak_count, 6.0);
        assert!(f.p75 > 0.5 && f.p75 < 1.0);
    }

    #[test]
    fn test_window_samples_view() {
        let signal = conditioned((0..200).map(|i| i as f64).collect());
        let windows = FeatureExtractor::default().extract(&signal);
        assert_eq!(windows[1].samples(&signal)[0], 45.0);
        assert_eq!(windows[1].samples(&signal).len(), 90);
    }

    #[test]
    fn test_feature_matrix_shape_and_order() {
        let signal = conditioned((0..300).map(|i| (i as f64 * 0.3).sin()).collect());
        let windows = FeatureExtractor::default().extract(&signal);
        let matrix = feature_matrix(&windows);

        assert_eq!(matrix.dim(), (windows.len(), FEATURE_COUNT));
        assert_eq!(matrix[[2, 0]], windows[2].features.mean);
        assert_eq!(matrix[[3, 5]], windows[3].features.p75);
    }

    proptest! {
        #[test]
        fn prop_window_count_formula(
            len in 0usize..2000,
            window in 2usize..200,
            stride_frac in 0.05f64..0.95,
        ) {
            let stride = ((window as f64 * stride_frac) as usize).max(1);
            prop_assume!(stride < window);
            let extractor = FeatureExtractor::new(window, stride);
            let windows = extractor.extract(&conditioned(vec![0.5; len]));

            let expected = if len >= window { (len - window) / stride + 1 } else { 0 };
            prop_assert_eq!(windows.len(), expected);
            if let Some(last) = windows.last() {
                prop_assert!(last.range.end <= len);
            }
        }
    }
}
