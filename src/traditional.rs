//! Traditional (reference) PPG measures.
//!
//! ## Algorithm
//! 1. Remove the mean and smooth with a Gaussian kernel
//! 2. Detect pulse peaks at least 0.5 s apart (refractory period)
//! 3. Heart rate = peaks / duration x 60
//! 4. HRV = standard deviation of inter-peak intervals in ms
//! 5. Respiratory rate = strongest Welch PSD bin inside (0.1, 0.5) Hz, x 60
//! 6. Pulse amplitude = peak-to-trough swing of the smoothed trace
//!
//! Works on the RAW signal: band-pass conditioning would strip the
//! respiratory baseline this estimator needs. Nothing here fails; a trace
//! with no detectable pulse or breathing yields zeros.

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::dsp;
use crate::metrics::TraditionalMeasures;
use crate::signal::RawSignal;

/// Reference measure estimator
#[derive(Debug, Clone)]
pub struct TraditionalMeasureEstimator {
    smoothing_sigma: f64,
    min_peak_distance_secs: f64,
    welch_segment_len: usize,
    resp_band_hz: (f64, f64),
    resp_min_relative_power: f64,
}

impl TraditionalMeasureEstimator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            smoothing_sigma: config.smoothing_sigma,
            min_peak_distance_secs: config.min_peak_distance_secs,
            welch_segment_len: config.welch_segment_len,
            resp_band_hz: (config.resp_band_low_hz, config.resp_band_high_hz),
            resp_min_relative_power: config.resp_min_relative_power,
        }
    }

    /// Compute all four reference measures from `raw`
    pub fn estimate(&self, raw: &RawSignal) -> TraditionalMeasures {
        let sample_rate = raw.sample_rate();
        let offset = dsp::mean(raw.samples());
        let centered: Vec<f64> = raw.samples().iter().map(|x| x - offset).collect();
        let smoothed = dsp::gaussian_smooth(&centered, self.smoothing_sigma);

        let distance = (self.min_peak_distance_secs * sample_rate).ceil().max(1.0) as usize;
        let peaks = dsp::find_peaks(&smoothed, distance);

        let heart_rate = peaks.len() as f64 / raw.duration_secs() * 60.0;
        let hrv = heart_rate_variability(&peaks, sample_rate);
        let resp_rate = self.respiratory_rate(&smoothed, sample_rate);
        let pulse_amp = peak_to_trough(&smoothed);

        debug!(
            "Traditional measures: {} peaks, HR {:.2} BPM, HRV {:.2} ms, RR {:.2} br/min, amp {:.3}",
            peaks.len(),
            heart_rate,
            hrv,
            resp_rate,
            pulse_amp
        );

        TraditionalMeasures {
            heart_rate,
            hrv,
            resp_rate,
            pulse_amp,
        }
    }

    /// Breaths per minute from the strongest in-band PSD bin (0 when the
    /// band is empty or holds no meaningful power)
    fn respiratory_rate(&self, smoothed: &[f64], sample_rate: f64) -> f64 {
        let psd = match dsp::welch(smoothed, sample_rate, self.welch_segment_len) {
            Ok(psd) => psd,
            Err(e) => {
                warn!("Welch PSD failed, reporting no respiratory content: {}", e);
                return 0.0;
            }
        };

        let total_peak = psd.max_power();
        if total_peak <= 0.0 {
            return 0.0;
        }

        let (low, high) = self.resp_band_hz;
        match psd.peak_in_band(low, high) {
            Some((freq, power)) if power >= self.resp_min_relative_power * total_peak => {
                freq * 60.0
            }
            Some((_, power)) => {
                debug!(
                    "Respiratory band power {:.3e} below {:.1e} of peak {:.3e}",
                    power, self.resp_min_relative_power, total_peak
                );
                0.0
            }
            None => 0.0,
        }
    }
}

impl Default for TraditionalMeasureEstimator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Standard deviation of inter-peak intervals in milliseconds (0 with
/// fewer than two peaks)
fn heart_rate_variability(peaks: &[usize], sample_rate: f64) -> f64 {
    if peaks.len() < 2 {
        return 0.0;
    }
    let intervals_ms: Vec<f64> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / sample_rate * 1000.0)
        .collect();
    dsp::std_dev(&intervals_ms)
}

fn peak_to_trough(samples: &[f64]) -> f64 {
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    if max.is_finite() && min.is_finite() {
        max - min
    } else {
        0.0
    }
}
