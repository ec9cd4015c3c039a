//! Zero-phase Butterworth band-pass filtering.
//!
//! The band-pass is a cascade of two biquads: a 2nd-order Butterworth
//! high-pass at the lower edge and a 2nd-order Butterworth low-pass at the
//! upper edge. Running the cascade forward and then backward over the
//! signal cancels the phase delay of each pass.
//!
//! Edge handling follows the usual forward-backward recipe:
//! - the signal is extended at both ends by an odd (point-symmetric)
//!   reflection of [`FILTFILT_PADLEN`] samples
//! - before each pass the filter state is settled on the first sample of
//!   that pass, so a DC offset does not ring through the output
//! - the padding is stripped after the backward pass

use biquad::{Biquad, Coefficients, DirectForm2Transposed, Hertz, Type, Q_BUTTERWORTH_F64};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Samples of odd-extension padding at each end
pub const FILTFILT_PADLEN: usize = 15;

/// Shortest input [`BandPassFilter::filtfilt`] accepts
pub const MIN_FILTFILT_LEN: usize = FILTFILT_PADLEN + 1;

/// Residual transient tolerated after settling the filter state
const SETTLE_TOLERANCE: f64 = 1e-12;

/// Band-pass built from a high-pass and a low-pass biquad
#[derive(Debug, Clone)]
pub struct BandPassFilter {
    sections: [Coefficients<f64>; 2],
    settle_len: usize,
}

impl BandPassFilter {
    /// Design a Butterworth band-pass with passband `[low_hz, high_hz]`.
    ///
    /// # Errors
    /// Returns `InvalidConfig` unless `0 < low_hz < high_hz < sample_rate / 2`.
    pub fn butterworth(sample_rate: f64, low_hz: f64, high_hz: f64) -> Result<Self> {
        let nyquist = sample_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(PipelineError::InvalidConfig(format!(
                "band-pass [{} Hz, {} Hz] must satisfy 0 < low < high < {} Hz (Nyquist)",
                low_hz, high_hz, nyquist
            )));
        }

        let highpass = design(Type::HighPass, sample_rate, low_hz)?;
        let lowpass = design(Type::LowPass, sample_rate, high_hz)?;
        let sections = [highpass, lowpass];
        let settle_len = settle_len(&sections);

        debug!(
            "Band-pass designed: {:.2}-{:.2} Hz at {} Hz, settle length {} samples",
            low_hz, high_hz, sample_rate, settle_len
        );

        Ok(Self {
            sections,
            settle_len,
        })
    }

    /// Forward-backward filter `samples` without phase delay.
    ///
    /// # Errors
    /// Returns `InsufficientData` for inputs shorter than [`MIN_FILTFILT_LEN`].
    pub fn filtfilt(&self, samples: &[f64]) -> Result<Vec<f64>> {
        if samples.len() < MIN_FILTFILT_LEN {
            return Err(PipelineError::InsufficientData {
                required: MIN_FILTFILT_LEN,
                actual: samples.len(),
            });
        }

        let mut extended = odd_extend(samples, FILTFILT_PADLEN);

        self.run_settled(&mut extended);
        extended.reverse();
        self.run_settled(&mut extended);
        extended.reverse();

        Ok(extended[FILTFILT_PADLEN..FILTFILT_PADLEN + samples.len()].to_vec())
    }

    /// Run the cascade over `buffer` in place, starting from the steady
    /// state for a constant input equal to `buffer[0]`
    fn run_settled(&self, buffer: &mut [f64]) {
        let mut stages = self.sections.clone().map(DirectForm2Transposed::<f64>::new);
        let first = buffer[0];

        for _ in 0..self.settle_len {
            stages.iter_mut().fold(first, |x, stage| stage.run(x));
        }

        for sample in buffer.iter_mut() {
            *sample = stages.iter_mut().fold(*sample, |x, stage| stage.run(x));
        }
    }
}

fn design(filter: Type<f64>, sample_rate: f64, cutoff_hz: f64) -> Result<Coefficients<f64>> {
    let fs = Hertz::<f64>::from_hz(sample_rate)
        .map_err(|e| PipelineError::InvalidConfig(format!("sample rate: {:?}", e)))?;
    let f0 = Hertz::<f64>::from_hz(cutoff_hz)
        .map_err(|e| PipelineError::InvalidConfig(format!("cutoff: {:?}", e)))?;

    Coefficients::<f64>::from_params(filter, fs, f0, Q_BUTTERWORTH_F64).map_err(|e| {
        PipelineError::InvalidConfig(format!("Failed to create filter coefficients: {:?}", e))
    })
}

/// Samples needed for the slowest section's transient to decay below
/// [`SETTLE_TOLERANCE`]
fn settle_len(sections: &[Coefficients<f64>]) -> usize {
    // Butterworth biquads have a complex pole pair with radius sqrt(a2)
    let radius = sections
        .iter()
        .map(|c| c.a2.abs().sqrt())
        .fold(0.0, f64::max);

    if radius <= 0.0 {
        return 32;
    }
    if radius >= 1.0 {
        return 1 << 16;
    }
    let len = (SETTLE_TOLERANCE.ln() / radius.ln()).ceil() as usize;
    len.clamp(32, 1 << 16)
}

/// Extend `x` at both ends with `pad` samples reflected through the end points
fn odd_extend(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    out
}
