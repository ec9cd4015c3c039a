//! Local maximum detection.

/// Indices of strict local maxima.
///
/// A flat plateau counts once, at its middle sample, when both sides fall
/// away from it. The first and last samples are never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Local maxima at least `distance` samples apart.
///
/// Taller peaks win: candidates are visited from highest to lowest and
/// every neighbour closer than `distance` to a kept peak is dropped.
pub fn find_peaks(x: &[f64], distance: usize) -> Vec<usize> {
    let peaks = local_maxima(x);
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_maxima() {
        let x = [0.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(local_maxima(&x), vec![1, 3]);
    }

    #[test]
    fn test_edges_are_not_peaks() {
        let x = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(local_maxima(&x).is_empty());
    }

    #[test]
    fn test_plateau_counts_once_at_middle() {
        let x = [0.0, 1.0, 1.0, 1.0, 0.0];
        assert_eq!(local_maxima(&x), vec![2]);
        let even = [0.0, 1.0, 1.0, 0.0];
        assert_eq!(local_maxima(&even), vec![1]);
    }

    #[test]
    fn test_plateau_running_into_edge_is_not_peak() {
        let x = [0.0, 1.0, 1.0, 1.0];
        assert!(local_maxima(&x).is_empty());
    }

    #[test]
    fn test_flat_signal_has_no_peaks() {
        assert!(local_maxima(&[0.0; 20]).is_empty());
        assert!(find_peaks(&[0.0; 20], 15).is_empty());
    }

    #[test]
    fn test_distance_keeps_taller_peak() {
        // Peaks at 2 (h=1) and 4 (h=3) closer than distance 5
        let x = [0.0, 0.5, 1.0, 0.5, 3.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        assert_eq!(local_maxima(&x), vec![2, 4, 11]);
        assert_eq!(find_peaks(&x, 5), vec![4, 11]);
    }

    #[test]
    fn test_distance_one_is_noop() {
        let x = [0.0, 1.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, 1), vec![1, 3]);
    }
}
