//! The anomaly-scorer seam.
//!
//! The pipeline consumes anomaly scores as a black box: any deterministic
//! unsupervised outlier detector can sit behind [`AnomalyScorer`]. Scores
//! are normalized so the most anomalous row maps to 1.0 and the least to
//! 0.0; the engine turns that into a bounded score bonus.

use ndarray::Array2;

/// An unsupervised outlier scorer over a node-feature matrix.
pub trait AnomalyScorer {
    /// Fit on `features` (one row per node) and return one normalized
    /// anomaly score in [0, 1] per row, in row order. Implementations must
    /// be deterministic for a fixed configuration.
    fn fit_score(&self, features: &Array2<f64>) -> Vec<f64>;
}

/// Min-max normalize raw scores so the maximum maps to 1.0 and the minimum
/// to 0.0. Higher input means more anomalous. Degenerate inputs (all equal,
/// empty) map to all zeros.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() || max - min <= 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|s| (s - min) / (max - min)).collect()
}
