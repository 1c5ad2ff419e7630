//! Engine configuration.
//!
//! Aggregates the per-detector configurations with the scoring, anomaly,
//! and arbitration parameters. Defaults reproduce the documented engine
//! behavior; embedders may deserialize overrides, which are validated
//! before an engine is built.

use serde::{Deserialize, Serialize};

use fraudgraph_detect::{
    CycleConfig, ImmunityConfig, ShellConfig, SmurfConfig, StructuringConfig, VelocityConfig,
};

use crate::error::{EngineError, EngineResult};

/// Anomaly-bonus parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Trees in the isolation forest.
    pub trees: usize,
    /// Sub-sample size per tree.
    pub max_samples: usize,
    /// RNG seed.
    pub seed: u64,
    /// Contamination used once the node count reaches
    /// `contamination_min_nodes`; below that the library default applies.
    pub contamination: f64,
    /// Node count from which the fixed contamination is used.
    pub contamination_min_nodes: usize,
    /// Multiplier turning the normalized score into a bonus.
    pub bonus_weight: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            seed: 42,
            contamination: 0.05,
            contamination_min_nodes: 20,
            bonus_weight: 15.0,
        }
    }
}

/// Composite-scoring and suppression parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Ceiling on the summed pattern weights, before bonuses.
    pub pattern_score_cap: f64,
    /// Bonus when tier-1 velocity coincides with a structural label.
    pub velocity_bonus: f64,
    /// Bonus when only tier-2 velocity coincides with a structural label.
    pub velocity_24h_bonus: f64,
    /// Bonus for accounts surrounded by high-scoring neighbors.
    pub isolation_bonus: f64,
    /// Preliminary score a neighbor must exceed to count.
    pub isolation_neighbor_score: f64,
    /// Number of qualifying neighbors required.
    pub isolation_min_neighbors: usize,
    /// Scores below this gate are zeroed.
    pub flag_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pattern_score_cap: 70.0,
            velocity_bonus: 10.0,
            velocity_24h_bonus: 5.0,
            isolation_bonus: 8.0,
            isolation_neighbor_score: 30.0,
            isolation_min_neighbors: 2,
            flag_threshold: 25.0,
        }
    }
}

/// Ring consolidation and arbitration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Jaccard similarity above which same-core smurf candidates merge.
    pub smurf_jaccard_threshold: f64,
    /// Overlap ratio above which a candidate merges into an existing ring.
    pub merge_overlap_ratio: f64,
    /// Member cap for non-cycle rings.
    pub max_non_cycle_members: usize,
    /// Minimum members for an accepted ring.
    pub min_ring_members: usize,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            smurf_jaccard_threshold: 0.6,
            merge_overlap_ratio: 0.6,
            max_non_cycle_members: 15,
            min_ring_members: 3,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Business-immunity thresholds.
    pub immunity: ImmunityConfig,
    /// Cycle-detection budgets and constraints.
    pub cycles: CycleConfig,
    /// Shell-network thresholds and budgets.
    pub shells: ShellConfig,
    /// Velocity / variance / hub thresholds.
    pub velocity: VelocityConfig,
    /// Smurfing windows and scoring thresholds.
    pub smurfing: SmurfConfig,
    /// Structuring bands and windows.
    pub structuring: StructuringConfig,
    /// Anomaly-bonus parameters.
    pub anomaly: AnomalyConfig,
    /// Scoring and suppression parameters.
    pub scoring: ScoringConfig,
    /// Consolidation and arbitration parameters.
    pub arbitration: ArbitrationConfig,
}

impl EngineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.cycles.max_depth < 3 {
            return Err(EngineError::config("cycles.max_depth must be at least 3"));
        }
        if self.cycles.max_ops_per_node == 0 || self.cycles.max_cycles == 0 {
            return Err(EngineError::config("cycle budgets must be positive"));
        }
        if self.cycles.max_ring_size < self.arbitration.min_ring_members {
            return Err(EngineError::config(
                "cycles.max_ring_size must be at least the minimum ring size",
            ));
        }
        if !(0.0..=1.0).contains(&self.arbitration.merge_overlap_ratio)
            || !(0.0..=1.0).contains(&self.arbitration.smurf_jaccard_threshold)
        {
            return Err(EngineError::config("arbitration ratios must lie in [0, 1]"));
        }
        if self.arbitration.min_ring_members == 0 {
            return Err(EngineError::config("min_ring_members must be positive"));
        }
        if !(0.0..=100.0).contains(&self.scoring.flag_threshold) {
            return Err(EngineError::config("flag_threshold must lie in [0, 100]"));
        }
        if self.anomaly.trees == 0 || self.anomaly.max_samples == 0 {
            return Err(EngineError::config("anomaly forest sizes must be positive"));
        }
        if self.smurfing.min_ring_size > self.smurfing.max_ring_size {
            return Err(EngineError::config(
                "smurfing.min_ring_size cannot exceed smurfing.max_ring_size",
            ));
        }
        if self.shells.max_path_nodes < 3 {
            return Err(EngineError::config("shells.max_path_nodes must be at least 3"));
        }
        Ok(())
    }
}
