//! Deterministic isolation forest.
//!
//! Standard random-partition construction: each tree isolates points by
//! recursive random splits; anomalous points isolate in short paths. The
//! RNG is a seeded ChaCha8 stream, so identical inputs always produce
//! identical scores.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::scorer::{normalize_scores, AnomalyScorer};

/// Isolation-forest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestConfig {
    /// Number of trees.
    pub trees: usize,
    /// Sub-sample size per tree (capped at the row count).
    pub max_samples: usize,
    /// RNG seed.
    pub seed: u64,
    /// Expected anomaly fraction. Retained for interface parity with the
    /// usual library signature; the min-max normalized output does not
    /// depend on it.
    pub contamination: Option<f64>,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            seed: 42,
            contamination: None,
        }
    }
}

/// Deterministic isolation forest over a node-feature matrix.
#[derive(Debug, Clone, Default)]
pub struct IsolationForest {
    config: IsolationForestConfig,
}

impl IsolationForest {
    /// Create a forest with the given configuration.
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }
}

impl AnomalyScorer for IsolationForest {
    fn fit_score(&self, features: &Array2<f64>) -> Vec<f64> {
        let rows = features.nrows();
        if rows == 0 {
            return Vec::new();
        }
        let psi = self.config.max_samples.min(rows);
        let expected_depth = average_path_length(psi);
        if expected_depth <= 0.0 {
            // One-point samples cannot rank anything.
            return vec![0.0; rows];
        }

        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut path_sums = vec![0.0f64; rows];

        for _ in 0..self.config.trees {
            let sample = sample_rows(&mut rng, rows, psi);
            let tree = build_tree(features, &sample, 0, height_limit, &mut rng);
            for (row, sum) in path_sums.iter_mut().enumerate() {
                *sum += path_length(&tree, features, row, 0);
            }
        }

        let raw: Vec<f64> = path_sums
            .iter()
            .map(|sum| {
                let mean_path = sum / self.config.trees as f64;
                // Shorter paths isolate faster: higher score, more anomalous.
                2f64.powf(-mean_path / expected_depth)
            })
            .collect();
        normalize_scores(&raw)
    }
}

enum TreeNode {
    Internal {
        feature: usize,
        split: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        size: usize,
    },
}

/// Sample `amount` distinct row indices, order-independent of the caller.
fn sample_rows(rng: &mut ChaCha8Rng, rows: usize, amount: usize) -> Vec<usize> {
    if amount >= rows {
        return (0..rows).collect();
    }
    let mut sample = rand::seq::index::sample(rng, rows, amount).into_vec();
    sample.sort_unstable();
    sample
}

fn build_tree(
    features: &Array2<f64>,
    rows: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut ChaCha8Rng,
) -> TreeNode {
    if depth >= height_limit || rows.len() <= 1 {
        return TreeNode::Leaf { size: rows.len() };
    }

    // Only features that still spread the sample can split it.
    let splittable: Vec<(usize, f64, f64)> = (0..features.ncols())
        .filter_map(|f| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &row in rows {
                let v = features[[row, f]];
                min = min.min(v);
                max = max.max(v);
            }
            (max > min).then_some((f, min, max))
        })
        .collect();
    if splittable.is_empty() {
        return TreeNode::Leaf { size: rows.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let split = rng.gen_range(min..max);

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&row| features[[row, feature]] < split);

    TreeNode::Internal {
        feature,
        split,
        left: Box::new(build_tree(features, &left_rows, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(features, &right_rows, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &TreeNode, features: &Array2<f64>, row: usize, depth: usize) -> f64 {
    match node {
        TreeNode::Leaf { size } => depth as f64 + average_path_length(*size),
        TreeNode::Internal {
            feature,
            split,
            left,
            right,
        } => {
            if features[[row, *feature]] < *split {
                path_length(left, features, row, depth + 1)
            } else {
                path_length(right, features, row, depth + 1)
            }
        }
    }
}

/// Average unsuccessful-search path length of a binary search tree over
/// `n` points, the c(n) normalizer of the isolation-forest construction.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}
