use nalgebra::DMatrix;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{KnnError, Result};

/// Percentage of positions where `predicted` equals `truth`.
pub fn accuracy(truth: &[String], predicted: &[String]) -> Result<f64> {
    if truth.len() != predicted.len() {
        return Err(KnnError::configuration(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(KnnError::configuration("accuracy of an empty test set"));
    }

    let matches = truth
        .iter()
        .zip(predicted)
        .filter(|(expected, actual)| expected == actual)
        .count();

    Ok(matches as f64 / truth.len() as f64 * 100.0)
}

/// Counts of (true label, predicted label) pairs. Rows are true labels,
/// columns are predictions, both indexed by `labels` in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: DMatrix<usize>,
}

impl ConfusionMatrix {
    pub fn new(truth: &[String], predicted: &[String]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(KnnError::configuration(format!(
                "{} true labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }

        let labels: Vec<String> = truth
            .iter()
            .chain(predicted)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut counts = DMatrix::zeros(labels.len(), labels.len());
        for (expected, actual) in truth.iter().zip(predicted) {
            let row = index_of(&labels, expected);
            let column = index_of(&labels, actual);
            counts[(row, column)] += 1;
        }

        Ok(Self { labels, counts })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &DMatrix<usize> {
        &self.counts
    }

    pub fn count(&self, truth: &str, predicted: &str) -> usize {
        match (self.position(truth), self.position(predicted)) {
            (Some(row), Some(column)) => self.counts[(row, column)],
            _ => 0,
        }
    }

    /// Number of test records whose true label is `truth`.
    pub fn support(&self, truth: &str) -> usize {
        self.position(truth)
            .map_or(0, |row| self.counts.row(row).iter().sum())
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }
}

fn index_of(labels: &[String], label: &str) -> usize {
    labels
        .binary_search_by(|probe| probe.as_str().cmp(label))
        .unwrap_or_else(|_| unreachable!("label domain is built from the same inputs"))
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .chain(self.counts.iter().map(|count| count.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:width$}", "")?;
        for label in &self.labels {
            write!(f, " {label:>width$}")?;
        }
        writeln!(f)?;

        for (row, label) in self.labels.iter().enumerate() {
            write!(f, "{label:>width$}")?;
            for column in 0..self.labels.len() {
                write!(f, " {:>width$}", self.counts[(row, column)])?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn accuracy_bounds() {
        let truth = labels(&["a", "b", "c"]);

        let perfect = accuracy(&truth, &truth).unwrap();
        assert!((perfect - 100.0).abs() < f64::EPSILON);

        let none = accuracy(&truth, &labels(&["b", "c", "a"])).unwrap();
        assert!(none.abs() < f64::EPSILON);

        let half = accuracy(&labels(&["a", "b"]), &labels(&["a", "a"])).unwrap();
        assert!((half - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn accuracy_rejects_misaligned_or_empty_input() {
        assert!(accuracy(&labels(&["a"]), &labels(&["a", "b"])).is_err());
        assert!(accuracy(&[], &[]).is_err());
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let truth = labels(&["cat", "cat", "dog", "dog", "dog", "bird"]);
        let predicted = labels(&["cat", "dog", "dog", "dog", "cat", "bird"]);

        let matrix = ConfusionMatrix::new(&truth, &predicted).unwrap();

        assert_eq!(matrix.labels(), ["bird", "cat", "dog"]);
        assert_eq!(matrix.count("cat", "cat"), 1);
        assert_eq!(matrix.count("cat", "dog"), 1);
        assert_eq!(matrix.count("dog", "dog"), 2);
        assert_eq!(matrix.count("dog", "cat"), 1);
        assert_eq!(matrix.count("bird", "bird"), 1);
        assert_eq!(matrix.count("bird", "fish"), 0);
        assert_eq!(matrix.total(), truth.len());
    }

    #[test]
    fn row_sums_match_true_label_counts() {
        let truth = labels(&["x", "y", "y", "z", "z", "z", "x"]);
        let predicted = labels(&["y", "y", "z", "z", "x", "z", "x"]);

        let matrix = ConfusionMatrix::new(&truth, &predicted).unwrap();

        for label in matrix.labels() {
            let expected = truth.iter().filter(|t| *t == label).count();
            assert_eq!(matrix.support(label), expected, "label {label}");
        }
    }

    #[test]
    fn label_domain_includes_predicted_only_labels() {
        let matrix = ConfusionMatrix::new(&labels(&["a", "a"]), &labels(&["a", "b"])).unwrap();

        assert_eq!(matrix.labels(), ["a", "b"]);
        assert_eq!(matrix.support("b"), 0);
        assert_eq!(matrix.counts().shape(), (2, 2));
    }

    #[test]
    fn renders_as_table() {
        let matrix = ConfusionMatrix::new(&labels(&["a", "b"]), &labels(&["a", "a"])).unwrap();

        assert_eq!(matrix.to_string(), "  a b\na 1 0\nb 1 0\n");
    }
}
