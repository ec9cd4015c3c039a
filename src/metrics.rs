use serde::{Deserialize, Serialize};
use std::fmt;

/// Physiological metric produced by both analysis paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    Hrv,
    RespRate,
    PulseAmp,
}

impl Metric {
    /// All metrics in reporting order
    pub const ALL: [Metric; 4] = [
        Metric::HeartRate,
        Metric::Hrv,
        Metric::RespRate,
        Metric::PulseAmp,
    ];

    /// Storage key for this metric
    pub fn key(&self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Hrv => "hrv",
            Self::RespRate => "resp_rate",
            Self::PulseAmp => "pulse_amp",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::HeartRate => "BPM",
            Self::Hrv => "ms",
            Self::RespRate => "breaths/min",
            Self::PulseAmp => "a.u.",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heart_rate" => Ok(Self::HeartRate),
            "hrv" => Ok(Self::Hrv),
            "resp_rate" => Ok(Self::RespRate),
            "pulse_amp" => Ok(Self::PulseAmp),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

/// One value per metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub heart_rate: f64,
    pub hrv: f64,
    pub resp_rate: f64,
    pub pulse_amp: f64,
}

/// Reference values computed directly from the raw signal.
///
/// These are the only labels the online models ever see.
pub type TraditionalMeasures = MetricValues;

impl MetricValues {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::Hrv => self.hrv,
            Metric::RespRate => self.resp_rate,
            Metric::PulseAmp => self.pulse_amp,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::HeartRate => self.heart_rate = value,
            Metric::Hrv => self.hrv = value,
            Metric::RespRate => self.resp_rate = value,
            Metric::PulseAmp => self.pulse_amp = value,
        }
    }

    /// Build from a per-metric function
    pub fn from_fn(mut f: impl FnMut(Metric) -> f64) -> Self {
        let mut values = Self::default();
        for metric in Metric::ALL {
            values.set(metric, f(metric));
        }
        values
    }

    /// Copy with every value rounded to 2 decimal places
    pub fn rounded(&self) -> Self {
        Self::from_fn(|metric| round2(self.get(metric)))
    }
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
