//! Brute-force k-nearest-neighbors classification of tabular data.

pub mod dataset;
pub mod error;
pub mod k_nearest_neighbors;
pub mod metrics;
pub mod parse;
pub mod plot;

pub use dataset::Dataset;
pub use error::{KnnError, Result};
pub use k_nearest_neighbors::KNearestNeighbors;
pub use metrics::ConfusionMatrix;
