use ndarray::{Array2, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{KnnError, Result};

pub const DEFAULT_SEED: u64 = 42;

/// Feature table plus label column, one row per record.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Vec<String>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Vec<String>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(KnnError::configuration(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        Ok(Self { features, labels })
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Reorders the records with a permutation drawn from `seed`.
    /// The same seed always yields the same order.
    #[must_use]
    pub fn shuffled(self, seed: u64) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let features = self.features.select(Axis(0), &order);
        let labels = order.iter().map(|&i| self.labels[i].clone()).collect();

        Self { features, labels }
    }

    /// Z-score normalizes every feature column in place. Missing values
    /// (`NaN`) are skipped when computing the moments and stay missing.
    pub fn standardize(&mut self) {
        for mut column in self.features.axis_iter_mut(Axis(1)) {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            let Some((mean, std_dev)) = moments(&present) else {
                continue;
            };

            if std_dev > 0.0 {
                column.mapv_inplace(|x| (x - mean) / std_dev);
            } else {
                column.mapv_inplace(|x| x - mean);
            }
        }
    }
}

fn moments(data: &[f64]) -> Option<(f64, f64)> {
    if data.is_empty() {
        return None;
    }

    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;

    Some((mean, variance.sqrt()))
}

/// Returns `(train_size, test_size)` for `n` records, with
/// `test_size = floor(n * test_split_ratio)`.
pub fn split_sizes(n: usize, test_split_ratio: f64) -> (usize, usize) {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let test_size = ((n as f64 * test_split_ratio).floor() as usize).min(n);

    (n - test_size, test_size)
}
