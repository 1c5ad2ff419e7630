//! # fraudgraph-ml
//!
//! Deterministic unsupervised anomaly scoring behind the pipeline's anomaly
//! bonus. The [`AnomalyScorer`] trait is the seam; [`IsolationForest`] is
//! the production implementation. Scores come back min-max normalized to
//! [0, 1], with 1.0 on the most anomalous row.

pub mod isolation_forest;
pub mod scorer;

pub use isolation_forest::{IsolationForest, IsolationForestConfig};
pub use scorer::{normalize_scores, AnomalyScorer};
