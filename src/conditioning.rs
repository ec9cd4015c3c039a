//! # Signal Conditioning
//!
//! Turns a raw fingertip intensity trace into the signal the feature
//! extractor works on. The chain, in order:
//!
//! 1. **Band-pass (0.5-4.0 Hz)** - keeps the physiologically plausible pulse band
//! 2. **Zero-phase filtering** - forward-backward pass, so no time delay is introduced
//! 3. **Standardization** - zero mean, unit standard deviation
//!
//! The traditional estimator deliberately does NOT use this output: it
//! works on the raw trace so that content outside the pulse band (the
//! respiratory baseline in particular) survives.

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dsp::{self, BandPassFilter};
use crate::error::Result;
use crate::signal::{ConditionedSignal, RawSignal};

/// Standard deviation below which the filtered signal counts as flat
const FLAT_STD: f64 = 1e-12;

/// Band-pass filter and standardizer for raw PPG traces
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    /// Lower passband edge in Hz
    low_hz: f64,
    /// Upper passband edge in Hz
    high_hz: f64,
}

impl SignalConditioner {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.passband_low_hz, config.passband_high_hz)
    }

    pub fn passband(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    /// Band-pass and standardize `raw`.
    ///
    /// Deterministic: the same samples and sample rate always give
    /// bit-identical output.
    ///
    /// # Errors
    /// - `InsufficientData` if the signal is too short for the filter
    /// - `InvalidConfig` if the passband does not fit below Nyquist
    pub fn condition(&self, raw: &RawSignal) -> Result<ConditionedSignal> {
        let filter = BandPassFilter::butterworth(raw.sample_rate(), self.low_hz, self.high_hz)?;

        // DC sits in the stopband; removing it up front keeps a flat trace exactly flat
        let offset = dsp::mean(raw.samples());
        let centered: Vec<f64> = raw.samples().iter().map(|x| x - offset).collect();
        let filtered = filter.filtfilt(&centered)?;

        let mean = dsp::mean(&filtered);
        let std = dsp::std_dev(&filtered);

        let samples = if std < FLAT_STD {
            debug!("Filtered signal is flat (std {:.3e}), conditioning to zeros", std);
            vec![0.0; filtered.len()]
        } else {
            filtered.iter().map(|x| (x - mean) / std).collect()
        };

        info!(
            "Conditioned {} samples at {} Hz ({:.1}-{:.1} Hz passband)",
            samples.len(),
            raw.sample_rate(),
            self.low_hz,
            self.high_hz
        );

        Ok(ConditionedSignal::new(samples, raw.sample_rate()))
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn pulse(freq_hz: f64, sample_rate: f64, n: usize, baseline: f64) -> RawSignal {
        let samples = (0..n)
            .map(|i| baseline + (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect();
        RawSignal::new(samples, sample_rate).unwrap()
    }

    #[test]
    fn test_default_passband_follows_config() {
        let config = PipelineConfig::default();
        assert_eq!(
            SignalConditioner::default().passband(),
            (config.passband_low_hz, config.passband_high_hz)
        );
    }

    #[test]
    fn test_output_is_standardized() {
        let raw = pulse(1.2, 30.0, 900, 140.0);
        let conditioned = SignalConditioner::default().condition(&raw).unwrap();

        assert_eq!(conditioned.len(), raw.len());
        assert!(dsp::mean(conditioned.samples()).abs() < 1e-9);
        assert!((dsp::std_dev(conditioned.samples()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_conditioning_is_deterministic() {
        let raw = pulse(1.4, 30.0, 600, 90.0);
        let conditioner = SignalConditioner::default();
        let a = conditioner.condition(&raw).unwrap();
        let b = conditioner.condition(&raw).unwrap();
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn test_short_signal_is_insufficient_data() {
        let raw = RawSignal::new(vec![1.0; 10], 30.0).unwrap();
        let err = SignalConditioner::default().condition(&raw).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { actual: 10, .. }));
    }

    #[test]
    fn test_passband_above_nyquist_is_invalid() {
        // 4 Hz upper edge does not fit under a 6 Hz sample rate's Nyquist
        let raw = pulse(1.0, 6.0, 120, 0.0);
        let err = SignalConditioner::default().condition(&raw).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_flat_signal_conditions_to_zeros() {
        let raw = RawSignal::new(vec![128.0; 300], 30.0).unwrap();
        let conditioned = SignalConditioner::default().condition(&raw).unwrap();
        assert!(conditioned.samples().iter().all(|&x| x == 0.0));
    }

    proptest! {
        #[test]
        fn prop_conditioning_produces_finite_output(
            samples in proptest::collection::vec(0.0f64..255.0, 16..600)
        ) {
            let raw = RawSignal::new(samples, 30.0).unwrap();
            let conditioned = SignalConditioner::default().condition(&raw).unwrap();
            prop_assert_eq!(conditioned.len(), raw.len());
            for x in conditioned.samples() {
                prop_assert!(x.is_finite());
            }
        }
    }
}
