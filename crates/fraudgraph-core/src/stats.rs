//! Dataset-level adaptive statistics.
//!
//! Thresholds across the detectors scale with these statistics instead of
//! being fixed constants, so dense synthetic batches and sparse real-world
//! batches are judged against their own baseline.

use statrs::statistics::Statistics;

use crate::graph::TransactionGraph;

/// Statistics computed once after ingest; read-only for the rest of the
/// analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveStats {
    /// Median of (in_degree + out_degree) over all nodes.
    pub median_degree: f64,
    /// Population standard deviation of node degrees.
    pub degree_std: f64,
    /// Median transaction amount.
    pub median_amount: f64,
    /// Population standard deviation of amounts.
    pub amount_std: f64,
    /// Seconds between the earliest and latest timestamp.
    pub time_span_secs: f64,
    /// External-degree limit for cycle validation:
    /// `max(2, floor(median_degree + 1.5 * degree_std))`.
    pub ext_degree_limit: usize,
}

impl Default for AdaptiveStats {
    fn default() -> Self {
        // Fallbacks for an empty batch.
        let median_degree = 2.0;
        let degree_std = 1.0;
        Self {
            median_degree,
            degree_std,
            median_amount: 1000.0,
            amount_std: 500.0,
            time_span_secs: 0.0,
            ext_degree_limit: ext_degree_limit(median_degree, degree_std),
        }
    }
}

impl AdaptiveStats {
    /// Compute the statistics for one graph.
    pub fn compute(graph: &TransactionGraph) -> Self {
        let mut stats = Self::default();

        let degrees: Vec<f64> = graph
            .accounts()
            .map(|a| graph.degree(a) as f64)
            .collect();
        if !degrees.is_empty() {
            stats.median_degree = median(&degrees);
            stats.degree_std = (&degrees).population_std_dev();
        }

        let amounts: Vec<f64> = graph.transactions().iter().map(|t| t.amount).collect();
        if !amounts.is_empty() {
            stats.median_amount = median(&amounts);
            stats.amount_std = (&amounts).population_std_dev();
        }

        if let (Some(first), Some(last)) = (
            graph.transactions().first(),
            graph.transactions().last(),
        ) {
            stats.time_span_secs =
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
        }

        stats.ext_degree_limit = ext_degree_limit(stats.median_degree, stats.degree_std);
        stats
    }

    /// Degree ceiling for cycle-eligible nodes:
    /// `max(20, floor(median_degree + 2 * degree_std))`.
    pub fn max_cycle_degree(&self) -> usize {
        ((self.median_degree + 2.0 * self.degree_std).floor() as usize).max(20)
    }

    /// Degree ceiling for shell candidates:
    /// `max(4, floor(median_degree + 0.5 * degree_std))`.
    pub fn max_shell_degree(&self) -> usize {
        ((self.median_degree + 0.5 * self.degree_std).floor() as usize).max(4)
    }

    /// Whether the batch is dense enough for the relaxed shell heuristics.
    pub fn is_dense(&self) -> bool {
        self.median_degree > 8.0
    }
}

fn ext_degree_limit(median_degree: f64, degree_std: f64) -> usize {
    ((median_degree + 1.5 * degree_std).floor() as usize).max(2)
}

/// Median with the average-of-middle-two convention.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Population coefficient of variation. Fewer than two samples or a zero
/// mean yield 0, which generally disqualifies the candidate being tested.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}
