//! Spectral analysis: full-length DFT magnitudes and Welch PSD.
//!
//! ## Welch's method
//! 1. Split the signal into segments of `segment_len` samples with 50% overlap
//! 2. Remove each segment's mean and apply a periodic Hann window
//! 3. Take the one-sided power spectrum of each segment (density scaling)
//! 4. Average the segment spectra
//!
//! Signals shorter than one segment are analysed as a single segment of
//! their own length.

use realfft::{FftError, RealFftPlanner};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

use super::stats::argmax;

/// Magnitudes of the full complex DFT of `samples`
pub fn dft_magnitudes(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples.len());

    let mut spectrum: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut spectrum);

    spectrum.iter().map(|c| c.norm()).collect()
}

/// Frequency (Hz) of the strongest DFT bin.
///
/// For real input the spectrum is symmetric, so only bins `0..=n/2` are
/// searched. Bins map to frequencies in DFT order, where the Nyquist bin of
/// an even-length transform is the negative frequency `-fs/2`. Returns 0 for
/// an empty spectrum.
pub fn dominant_frequency(magnitudes: &[f64], sample_rate: f64) -> f64 {
    let n = magnitudes.len();
    if n == 0 {
        return 0.0;
    }
    match argmax(&magnitudes[..=n / 2]) {
        Some(k) => bin_frequency(k, n, sample_rate),
        None => 0.0,
    }
}

/// Frequency of DFT bin `k` out of `n`, negative for the upper half
fn bin_frequency(k: usize, n: usize, sample_rate: f64) -> f64 {
    let step = sample_rate / n as f64;
    if k < n.div_ceil(2) {
        k as f64 * step
    } else {
        (k as f64 - n as f64) * step
    }
}

/// One-sided power spectral density estimate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Strongest bin over the whole spectrum
    pub fn max_power(&self) -> f64 {
        self.power.iter().copied().fold(0.0, f64::max)
    }

    /// Strongest bin strictly inside `(low_hz, high_hz)` as `(frequency, power)`
    pub fn peak_in_band(&self, low_hz: f64, high_hz: f64) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;
        for (&f, &p) in self.frequencies.iter().zip(&self.power) {
            if f <= low_hz || f >= high_hz {
                continue;
            }
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((f, p)),
            }
        }
        best
    }
}

/// Welch PSD of `samples`
pub fn welch(
    samples: &[f64],
    sample_rate: f64,
    segment_len: usize,
) -> Result<PowerSpectrum, FftError> {
    let n = samples.len();
    let nperseg = segment_len.min(n);
    if nperseg < 2 {
        return Ok(PowerSpectrum::default());
    }
    let step = nperseg - nperseg / 2;

    let window = hann_periodic(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_power);

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(nperseg);
    let mut input = r2c.make_input_vec();
    let mut output = r2c.make_output_vec();

    let bins = output.len();
    let mut power = vec![0.0; bins];
    let mut segments = 0usize;

    let mut start = 0;
    while start + nperseg <= n {
        let segment = &samples[start..start + nperseg];
        let seg_mean = segment.iter().sum::<f64>() / nperseg as f64;
        for ((dst, &s), &w) in input.iter_mut().zip(segment).zip(&window) {
            *dst = (s - seg_mean) * w;
        }

        r2c.process(&mut input, &mut output)?;

        for (k, c) in output.iter().enumerate() {
            let mut p = c.norm_sqr() * scale;
            // One-sided: fold negative frequencies except DC and Nyquist
            let is_nyquist = nperseg % 2 == 0 && k == bins - 1;
            if k != 0 && !is_nyquist {
                p *= 2.0;
            }
            power[k] += p;
        }

        segments += 1;
        start += step;
    }

    for p in power.iter_mut() {
        *p /= segments as f64;
    }

    let frequencies = (0..bins)
        .map(|k| k as f64 * sample_rate / nperseg as f64)
        .collect();

    Ok(PowerSpectrum { frequencies, power })
}

/// Periodic (DFT-even) Hann window
fn hann_periodic(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}
