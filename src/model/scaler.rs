//! Per-feature standardization.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Mean/scale standardizer, fitted once and then frozen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Population variance per feature
    pub var: Vec<f64>,
    /// sqrt(var), or 1 for constant features
    pub scale: Vec<f64>,
    /// Rows seen at fit time
    pub samples_seen: usize,
}

impl StandardScaler {
    /// Fit on a `(rows, features)` batch. Returns `None` for an empty batch.
    pub fn fit(batch: ArrayView2<'_, f64>) -> Option<Self> {
        let mean = batch.mean_axis(Axis(0))?;
        let var = batch.var_axis(Axis(0), 0.0);
        let scale = var.mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });

        Some(Self {
            mean: mean.to_vec(),
            var: var.to_vec(),
            scale: scale.to_vec(),
            samples_seen: batch.nrows(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Array1<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_fit_and_transform() {
        let batch = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(batch.view()).unwrap();

        assert_eq!(scaler.mean, vec![3.0, 10.0]);
        assert!((scaler.var[0] - 8.0 / 3.0).abs() < 1e-12);
        // Constant feature keeps unit scale
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.samples_seen, 3);

        let z = scaler.transform_row(batch.row(2));
        assert!((z[0] - 2.0 / (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(z[1], 0.0);
    }

    #[test]
    fn test_empty_batch_does_not_fit() {
        let batch = Array2::<f64>::zeros((0, 6));
        assert!(StandardScaler::fit(batch.view()).is_none());
    }
}
