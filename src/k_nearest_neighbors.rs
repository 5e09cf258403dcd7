use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::dataset::{split_sizes, Dataset};
use crate::error::{KnnError, Result};
use crate::metrics::{self, ConfusionMatrix};

/// Candidate k values tried by [`KNearestNeighbors::best_k`].
pub const K_CANDIDATES: std::ops::RangeInclusive<usize> = 1..=19;

#[derive(Debug, Clone)]
struct Split {
    train_features: Array2<f64>,
    train_labels: Vec<String>,
    test_features: Array2<f64>,
    test_labels: Vec<String>,
}

/// Brute-force k-nearest-neighbors classifier under Euclidean distance.
///
/// The classifier owns its train/test split: call
/// [`train_test_split`](Self::train_test_split) first, then
/// [`predict`](Self::predict) and the scoring methods.
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    k: usize,
    test_split_ratio: f64,
    split: Option<Split>,
    predictions: Option<Vec<String>>,
}

impl KNearestNeighbors {
    pub fn new(k: usize, test_split_ratio: f64) -> Result<Self> {
        let mut classifier = Self {
            k: 1,
            test_split_ratio: 0.0,
            split: None,
            predictions: None,
        };
        classifier.set_k(k)?;
        classifier.set_test_split_ratio(test_split_ratio)?;

        Ok(classifier)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn set_k(&mut self, k: usize) -> Result<()> {
        if k == 0 {
            return Err(KnnError::configuration("k must be positive"));
        }

        self.k = k;
        Ok(())
    }

    pub fn test_split_ratio(&self) -> f64 {
        self.test_split_ratio
    }

    /// Takes effect on the next call to [`train_test_split`](Self::train_test_split).
    pub fn set_test_split_ratio(&mut self, test_split_ratio: f64) -> Result<()> {
        if !(0.0..1.0).contains(&test_split_ratio) {
            return Err(KnnError::configuration(format!(
                "test split ratio must be in [0, 1), got {test_split_ratio}"
            )));
        }

        self.test_split_ratio = test_split_ratio;
        Ok(())
    }

    /// Splits already-shuffled records into a leading training block and a
    /// trailing test block of `floor(n * test_split_ratio)` records.
    pub fn train_test_split(&mut self, features: ArrayView2<f64>, labels: &[String]) -> Result<()> {
        let n = features.nrows();
        if n != labels.len() {
            return Err(KnnError::configuration(format!(
                "{n} feature rows but {} labels",
                labels.len()
            )));
        }

        let (train_size, test_size) = split_sizes(n, self.test_split_ratio);
        assert_eq!(n, train_size + test_size, "Size mismatch!");

        let (train_features, test_features) = features.split_at(Axis(0), train_size);
        self.split = Some(Split {
            train_features: train_features.to_owned(),
            train_labels: labels[..train_size].to_vec(),
            test_features: test_features.to_owned(),
            test_labels: labels[train_size..].to_vec(),
        });
        self.predictions = None;

        debug!(train_size, test_size, "dataset split");
        Ok(())
    }

    pub fn split_dataset(&mut self, dataset: &Dataset) -> Result<()> {
        self.train_test_split(dataset.features(), dataset.labels())
    }

    pub fn train_features(&self) -> Result<ArrayView2<'_, f64>> {
        Ok(self.split()?.train_features.view())
    }

    pub fn train_labels(&self) -> Result<&[String]> {
        Ok(&self.split()?.train_labels)
    }

    pub fn test_features(&self) -> Result<ArrayView2<'_, f64>> {
        Ok(self.split()?.test_features.view())
    }

    pub fn test_labels(&self) -> Result<&[String]> {
        Ok(&self.split()?.test_labels)
    }

    pub fn predictions(&self) -> Option<&[String]> {
        self.predictions.as_deref()
    }

    /// Euclidean distance from `query` to every training record, in training order.
    pub fn euclidean(&self, query: ArrayView1<f64>) -> Result<Array1<f64>> {
        let train = &self.split()?.train_features;
        if query.len() != train.ncols() {
            return Err(KnnError::DimensionMismatch {
                expected: train.ncols(),
                found: query.len(),
            });
        }

        Ok(train.map_axis(Axis(1), |row| {
            row.iter()
                .zip(query.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        }))
    }

    /// Majority label among the k nearest training records.
    pub fn classify(&self, query: ArrayView1<f64>) -> Result<String> {
        let split = self.split()?;
        if split.train_labels.is_empty() {
            return Err(KnnError::configuration("training set is empty"));
        }
        if self.k > split.train_labels.len() {
            return Err(KnnError::configuration(format!(
                "k = {} exceeds training set size {}",
                self.k,
                split.train_labels.len()
            )));
        }

        let distances = self.euclidean(query)?;
        let mut neighbors: Vec<(f64, &str)> = distances
            .iter()
            .copied()
            .zip(split.train_labels.iter().map(String::as_str))
            .collect();

        // stable: equal distances keep training order, NaN of either sign goes last
        neighbors.sort_by(|a, b| {
            a.0.is_nan()
                .cmp(&b.0.is_nan())
                .then(a.0.total_cmp(&b.0))
        });

        Ok(mode(neighbors[..self.k].iter().map(|&(_, label)| label)).to_owned())
    }

    /// Predicts one label per row of `features` and keeps the result for
    /// [`accuracy`](Self::accuracy) and [`confusion_matrix`](Self::confusion_matrix).
    pub fn predict(&mut self, features: ArrayView2<f64>) -> Result<&[String]> {
        let predictions = self.predict_rows(features)?;
        Ok(self.predictions.insert(predictions).as_slice())
    }

    /// Predicts the held-out test block.
    pub fn predict_test_set(&mut self) -> Result<&[String]> {
        let predictions = self.predict_rows(self.split()?.test_features.view())?;
        Ok(self.predictions.insert(predictions).as_slice())
    }

    fn predict_rows(&self, features: ArrayView2<f64>) -> Result<Vec<String>> {
        features
            .rows()
            .into_iter()
            .map(|row| self.classify(row))
            .collect()
    }

    /// Percentage of test records whose stored prediction matches the true label.
    pub fn accuracy(&self) -> Result<f64> {
        metrics::accuracy(&self.split()?.test_labels, self.stored_predictions()?)
    }

    pub fn confusion_matrix(&self) -> Result<ConfusionMatrix> {
        ConfusionMatrix::new(&self.split()?.test_labels, self.stored_predictions()?)
    }

    /// Accuracy on the test block for every k in `candidates`, skipping
    /// values larger than the training set. Afterwards the classifier holds
    /// the first most accurate k and the predictions made with it.
    pub fn k_sweep(
        &mut self,
        candidates: impl IntoIterator<Item = usize>,
    ) -> Result<Vec<(usize, f64)>> {
        let train_size = self.split()?.train_labels.len();
        let mut curve = Vec::new();

        let mut best: Option<(usize, f64, Vec<String>)> = None;

        for k in candidates.into_iter().filter(|&k| k <= train_size) {
            self.set_k(k)?;
            let split = self.split()?;
            let predictions = self.predict_rows(split.test_features.view())?;
            let accuracy = metrics::accuracy(&split.test_labels, &predictions)?;
            debug!(k, accuracy, "k sweep step");
            curve.push((k, accuracy));

            let improves = match &best {
                Some((_, best_accuracy, _)) => accuracy > *best_accuracy,
                None => true,
            };
            if improves {
                best = Some((k, accuracy, predictions));
            }
        }

        if let Some((k, _, predictions)) = best {
            self.k = k;
            self.predictions = Some(predictions);
        }

        Ok(curve)
    }

    /// Sweeps [`K_CANDIDATES`] and returns the first k with the highest
    /// accuracy. The classifier keeps that k and its predictions.
    pub fn best_k(&mut self) -> Result<(usize, f64)> {
        self.best_k_with_curve().map(|(best, _)| best)
    }

    /// Like [`best_k`](Self::best_k), also returning the whole sweep.
    pub fn best_k_with_curve(&mut self) -> Result<((usize, f64), Vec<(usize, f64)>)> {
        let curve = self.k_sweep(K_CANDIDATES)?;
        let (best_k, best_accuracy) = best_of(&curve)
            .ok_or_else(|| KnnError::configuration("training set is empty"))?;

        info!(k = best_k, accuracy = best_accuracy, "best k found");
        Ok(((best_k, best_accuracy), curve))
    }

    fn split(&self) -> Result<&Split> {
        self.split.as_ref().ok_or_else(|| {
            KnnError::configuration("classifier has no data; call train_test_split first")
        })
    }

    fn stored_predictions(&self) -> Result<&[String]> {
        self.predictions
            .as_deref()
            .ok_or_else(|| KnnError::configuration("no predictions; call predict first"))
    }
}

/// First entry with the strictly highest accuracy.
fn best_of(curve: &[(usize, f64)]) -> Option<(usize, f64)> {
    curve.iter().copied().fold(None, |best, (k, accuracy)| match best {
        Some((_, best_accuracy)) if accuracy <= best_accuracy => best,
        _ => Some((k, accuracy)),
    })
}

/// Most frequent label. Ties go to the lexicographically smallest label.
fn mode<'a>(labels: impl Iterator<Item = &'a str>) -> &'a str {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut winner = "";
    let mut winner_count = 0;
    for (label, count) in counts {
        if count > winner_count {
            winner = label;
            winner_count = count;
        }
    }

    winner
}
