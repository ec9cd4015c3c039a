//! Gaussian smoothing used ahead of peak detection.

/// Kernel support in standard deviations
const TRUNCATE_SIGMAS: f64 = 4.0;

/// Smooth `samples` with a Gaussian kernel of `sigma` samples.
///
/// Boundaries use half-sample symmetric reflection (`d c b a | a b c d`),
/// so the output has the same length as the input. A non-positive sigma
/// returns the input unchanged.
pub fn gaussian_smooth(samples: &[f64], sigma: f64) -> Vec<f64> {
    if samples.is_empty() || !(sigma > 0.0) {
        return samples.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n = samples.len() as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * samples[reflect(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE_SIGMAS * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Map an out-of-range index back into `[0, n)` by mirror reflection
fn reflect(idx: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = idx.rem_euclid(period);
    if m < n {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}
