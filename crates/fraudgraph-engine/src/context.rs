//! Per-analysis state.
//!
//! One context object carries everything the stages exchange. Each field is
//! written by exactly one stage and read by later ones; the graph, the
//! adaptive statistics, and the immunity map are read-only once written.

use std::collections::{BTreeMap, BTreeSet};

use fraudgraph_core::{
    AccountId, AdaptiveStats, CandidateRing, FraudRing, PatternSet, TransactionGraph,
};
use fraudgraph_detect::ImmunityMap;

/// Mutable state of one analysis run.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    /// Read-only after ingest.
    pub graph: TransactionGraph,
    /// Read-only after stage 0.
    pub stats: AdaptiveStats,
    /// Rows dropped by ingest coercion.
    pub dropped_rows: usize,
    /// Read-only after stage 1.
    pub immunity: ImmunityMap,
    /// Accumulates across stages 1-2; filtered in stages 3 and 5.
    pub patterns: BTreeMap<AccountId, PatternSet>,
    /// Tier-1 velocity membership, consulted by the scoring bonus.
    pub velocity_accounts: BTreeSet<AccountId>,
    /// Tier-2 velocity membership, consulted by the scoring bonus.
    pub velocity_24h_accounts: BTreeSet<AccountId>,
    /// Commercial hubs, consulted by suppression only.
    pub commercial_hubs: BTreeSet<AccountId>,
    /// Stage-2 output, consumed by consolidation.
    pub candidate_rings: Vec<CandidateRing>,
    /// Stage-4 output.
    pub fraud_rings: Vec<FraudRing>,
    /// Stage-7 output.
    pub suspicion_scores: BTreeMap<AccountId, f64>,
    /// Explanation strings built during scoring.
    pub explanations: BTreeMap<AccountId, String>,
}

impl AnalysisContext {
    /// Merge detector labels into the per-account pattern sets.
    pub fn add_labels(&mut self, labels: BTreeMap<AccountId, PatternSet>) {
        for (account, set) in labels {
            let entry = self.patterns.entry(account).or_default();
            *entry = entry.union(set);
        }
    }

    /// The label set of one account (empty if none).
    pub fn labels_of(&self, account: &str) -> PatternSet {
        self.patterns.get(account).copied().unwrap_or_default()
    }
}
