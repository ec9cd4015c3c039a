//! Signal-processing building blocks shared by conditioning, feature
//! extraction and the traditional estimator.

pub mod filter;
pub mod peaks;
pub mod smoothing;
pub mod spectrum;
pub mod stats;

pub use filter::{BandPassFilter, MIN_FILTFILT_LEN};
pub use peaks::{find_peaks, local_maxima};
pub use smoothing::gaussian_smooth;
pub use spectrum::{dft_magnitudes, dominant_frequency, welch, PowerSpectrum};
pub use stats::{mean, percentile, std_dev};
