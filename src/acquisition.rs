//! Signal sources feeding the pipeline.
//!
//! A capture is one [`RawSignal`]: the per-frame fingertip intensity trace
//! at the camera frame rate. Sources block until the whole capture is
//! available; the pipeline never sees partial captures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AcquisitionError, PipelineError};
use crate::signal::RawSignal;

/// Anything that can produce a raw capture
pub trait SignalSource {
    fn acquire(&mut self) -> Result<RawSignal, AcquisitionError>;
}

/// Reads samples from a text/CSV file.
///
/// One or more comma-separated samples per line. Blank lines and `#`
/// comments are skipped, and a non-numeric first line is taken as a header.
#[derive(Debug, Clone)]
pub struct FileSignalSource {
    path: PathBuf,
    sample_rate: f64,
}

impl FileSignalSource {
    pub fn new(path: impl Into<PathBuf>, sample_rate: f64) -> Self {
        Self {
            path: path.into(),
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for FileSignalSource {
    fn acquire(&mut self) -> Result<RawSignal, AcquisitionError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| AcquisitionError::Io {
            path: self.path.clone(),
            source,
        })?;
        let samples = parse_samples(&content)?;
        info!("Read {} samples from {:?}", samples.len(), self.path);
        into_raw(samples, self.sample_rate)
    }
}

/// Parse sample text as described on [`FileSignalSource`]
pub fn parse_samples(content: &str) -> Result<Vec<f64>, AcquisitionError> {
    let mut samples = Vec::new();
    let mut seen_data = false;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed: Result<Vec<f64>, _> = line
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(|field| {
                field
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or(field)
            })
            .collect();

        match parsed {
            Ok(values) => samples.extend(values),
            Err(_) if !seen_data && samples.is_empty() => {
                debug!("Skipping header line: {}", line);
            }
            Err(field) => {
                return Err(AcquisitionError::Parse {
                    line: idx + 1,
                    value: field.to_string(),
                })
            }
        }
        seen_data = true;
    }

    if samples.is_empty() {
        return Err(AcquisitionError::Empty);
    }
    Ok(samples)
}

fn into_raw(samples: Vec<f64>, sample_rate: f64) -> Result<RawSignal, AcquisitionError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(AcquisitionError::InvalidSampleRate(sample_rate));
    }
    RawSignal::new(samples, sample_rate).map_err(|e| match e {
        PipelineError::InvalidSignal(reason) => AcquisitionError::InvalidCapture(reason),
        other => AcquisitionError::InvalidCapture(other.to_string()),
    })
}

/// Parameters of a synthetic fingertip capture
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPulseConfig {
    pub sample_rate: f64,
    pub duration_secs: f64,
    pub heart_rate_bpm: f64,
    /// Pulse half-swing around the baseline
    pub pulse_amplitude: f64,
    /// Breathing rate; `None` for no baseline modulation
    pub resp_rate_bpm: Option<f64>,
    pub resp_amplitude: f64,
    /// Peak uniform noise amplitude
    pub noise: f64,
    /// Mean intensity level
    pub baseline: f64,
    pub seed: u64,
}

impl Default for SyntheticPulseConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            duration_secs: 30.0,
            heart_rate_bpm: 72.0,
            pulse_amplitude: 1.0,
            resp_rate_bpm: None,
            resp_amplitude: 0.5,
            noise: 0.0,
            baseline: 128.0,
            seed: 42,
        }
    }
}

/// Deterministic generator of sinusoidal pulse captures.
///
/// Each `acquire` draws fresh noise from the same seeded stream, so a
/// sequence of captures is reproducible but not identical.
#[derive(Debug, Clone)]
pub struct SyntheticPulseSource {
    config: SyntheticPulseConfig,
    rng: StdRng,
}

impl SyntheticPulseSource {
    pub fn new(config: SyntheticPulseConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    pub fn config(&self) -> &SyntheticPulseConfig {
        &self.config
    }

    /// Change the simulated heart rate for subsequent captures
    pub fn set_heart_rate(&mut self, bpm: f64) {
        self.config.heart_rate_bpm = bpm;
    }
}

impl SignalSource for SyntheticPulseSource {
    fn acquire(&mut self) -> Result<RawSignal, AcquisitionError> {
        let cfg = &self.config;
        if !(cfg.sample_rate.is_finite() && cfg.sample_rate > 0.0) {
            return Err(AcquisitionError::InvalidSampleRate(cfg.sample_rate));
        }

        let n = (cfg.sample_rate * cfg.duration_secs).round() as usize;
        if n == 0 {
            return Err(AcquisitionError::Empty);
        }

        let pulse_hz = cfg.heart_rate_bpm / 60.0;
        let resp_hz = cfg.resp_rate_bpm.map(|bpm| bpm / 60.0);

        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / cfg.sample_rate;
            let mut x = cfg.baseline + cfg.pulse_amplitude * (2.0 * PI * pulse_hz * t).sin();
            if let Some(f) = resp_hz {
                x += cfg.resp_amplitude * (2.0 * PI * f * t).sin();
            }
            if cfg.noise > 0.0 {
                x += self.rng.gen_range(-cfg.noise..=cfg.noise);
            }
            samples.push(x);
        }

        debug!(
            "Synthesized {} samples: {:.1} BPM pulse, resp {:?} br/min, noise {:.3}",
            n, cfg.heart_rate_bpm, cfg.resp_rate_bpm, cfg.noise
        );
        into_raw(samples, cfg.sample_rate)
    }
}
