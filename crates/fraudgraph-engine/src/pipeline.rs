//! The staged analysis pipeline.
//!
//! One engine value holds a validated configuration and turns transaction
//! batches into reports. Stages run strictly in order; data flows forward
//! only, and every collection boundary is sorted, so identical inputs yield
//! identical reports (processing time aside).

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::Array2;
use tracing::info;

use fraudgraph_core::{
    AccountId, AdaptiveStats, Dataset, PatternSet, RawTable, Transaction, TransactionGraph,
};
use fraudgraph_detect::{
    detect_cycles, detect_immunity, detect_shells, detect_smurfing, detect_structuring,
    detect_velocity,
};
use fraudgraph_ml::{AnomalyScorer, IsolationForest, IsolationForestConfig};

use crate::config::EngineConfig;
use crate::consolidation::{arbitrate, consolidate_smurfs};
use crate::context::AnalysisContext;
use crate::error::EngineResult;
use crate::hierarchy::enforce_hierarchy;
use crate::report::{build_report, AnalysisReport};
use crate::scoring::score_accounts;

/// One-shot forensics engine over in-memory transaction batches.
#[derive(Debug, Clone, Default)]
pub struct ForensicsEngine {
    config: EngineConfig,
}

impl ForensicsEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze a raw table: schema check, coercion, full pipeline.
    pub fn analyze(&self, table: &RawTable) -> EngineResult<AnalysisReport> {
        let dataset = Dataset::from_table(table)?;
        Ok(self.run(dataset, None))
    }

    /// Analyze a raw table with a caller-supplied anomaly scorer.
    pub fn analyze_with_scorer(
        &self,
        table: &RawTable,
        scorer: &dyn AnomalyScorer,
    ) -> EngineResult<AnalysisReport> {
        let dataset = Dataset::from_table(table)?;
        Ok(self.run(dataset, Some(scorer)))
    }

    /// Analyze already-typed transactions (nothing is dropped).
    pub fn analyze_transactions(&self, transactions: Vec<Transaction>) -> AnalysisReport {
        self.run(Dataset::from_transactions(transactions), None)
    }

    fn run(&self, dataset: Dataset, scorer: Option<&dyn AnomalyScorer>) -> AnalysisReport {
        let started = Instant::now();
        let config = &self.config;

        // Stage 0: graph + adaptive statistics.
        let mut ctx = AnalysisContext {
            dropped_rows: dataset.dropped_rows,
            ..AnalysisContext::default()
        };
        let transactions = dataset.len();
        ctx.graph = TransactionGraph::from_dataset(dataset);
        ctx.stats = AdaptiveStats::compute(&ctx.graph);
        info!(
            transactions,
            accounts = ctx.graph.node_count(),
            dropped = ctx.dropped_rows,
            "Stage 0: ingest and adaptive statistics"
        );

        // Stage 1: business immunity.
        ctx.immunity = detect_immunity(&ctx.graph, &config.immunity);
        let mut immune_labels: BTreeMap<AccountId, PatternSet> = BTreeMap::new();
        for (account, kind) in &ctx.immunity {
            let mut set = PatternSet::EMPTY;
            set.insert(kind.label());
            immune_labels.insert(account.clone(), set);
        }
        ctx.add_labels(immune_labels);
        info!(immune = ctx.immunity.len(), "Stage 1: business immunity");

        // Stage 2: candidate detection.
        let cycles = detect_cycles(&ctx.graph, &ctx.stats, &ctx.immunity, &config.cycles);
        info!(candidates = cycles.candidates.len(), "Stage 2: cycle detection");
        ctx.add_labels(cycles.labels);
        ctx.candidate_rings.extend(cycles.candidates);

        let shells = detect_shells(&ctx.graph, &ctx.stats, &ctx.immunity, &config.shells);
        info!(candidates = shells.candidates.len(), "Stage 2: shell detection");
        ctx.add_labels(shells.labels);
        ctx.candidate_rings.extend(shells.candidates);

        let velocity = detect_velocity(&ctx.graph, &ctx.stats, &config.velocity);
        info!(
            tier1 = velocity.velocity.len(),
            tier2 = velocity.velocity_24h.len(),
            hubs = velocity.commercial_hubs.len(),
            "Stage 2: velocity signals"
        );
        ctx.velocity_accounts = velocity.velocity;
        ctx.velocity_24h_accounts = velocity.velocity_24h;
        ctx.commercial_hubs = velocity.commercial_hubs;
        ctx.add_labels(velocity.labels);

        let smurfs = detect_smurfing(&ctx.graph, &ctx.immunity, &config.smurfing);
        info!(candidates = smurfs.candidates.len(), "Stage 2: smurfing detection");
        ctx.add_labels(smurfs.labels);
        ctx.candidate_rings.extend(smurfs.candidates);

        let structuring = detect_structuring(&ctx.graph, &config.structuring);
        info!(accounts = structuring.len(), "Stage 2: structuring detection");
        ctx.add_labels(structuring);

        // Stage 3: immune-member cleanup. Immune accounts keep their
        // immunity tag plus any strong-fraud labels (immunity never
        // overrides strong fraud); everything weaker is stripped. Candidate
        // rings drop immune members unless a strong-fraud label keeps them.
        for account in ctx.immunity.keys() {
            if let Some(set) = ctx.patterns.get_mut(account) {
                *set = set.intersection(PatternSet::IMMUNITY.union(PatternSet::STRONG_FRAUD));
            }
        }
        let candidates = std::mem::take(&mut ctx.candidate_rings);
        ctx.candidate_rings = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                candidate.members.retain(|m| {
                    !ctx.immunity.contains_key(m)
                        || ctx
                            .patterns
                            .get(m)
                            .is_some_and(|s| s.intersects(PatternSet::STRONG_FRAUD))
                });
                (candidate.members.len() >= config.arbitration.min_ring_members).then(|| {
                    candidate.members.sort();
                    candidate
                })
            })
            .collect();

        // Stage 4: consolidation + arbitration.
        let consolidated =
            consolidate_smurfs(std::mem::take(&mut ctx.candidate_rings), &config.arbitration);
        ctx.fraud_rings = arbitrate(consolidated, &config.arbitration);
        info!(rings = ctx.fraud_rings.len(), "Stage 4: ring consolidation");

        // Stage 5: pattern hierarchy.
        enforce_hierarchy(&mut ctx.patterns);

        // Stages 6-7: composite scoring and suppression.
        let bonus = self.anomaly_bonus(&ctx, scorer);
        score_accounts(&mut ctx, &config.scoring, &bonus);
        let flagged = ctx.suspicion_scores.values().filter(|s| **s > 0.0).count();
        info!(flagged, "Stage 7: scoring and suppression");

        build_report(&ctx, started.elapsed().as_secs_f64())
    }

    /// Per-account anomaly bonus: degree/volume features through the
    /// scorer, scaled by the bonus weight.
    fn anomaly_bonus(
        &self,
        ctx: &AnalysisContext,
        scorer: Option<&dyn AnomalyScorer>,
    ) -> BTreeMap<AccountId, f64> {
        let n = ctx.graph.node_count();
        if n == 0 {
            return BTreeMap::new();
        }

        let mut flat = Vec::with_capacity(n * 4);
        for account in ctx.graph.accounts() {
            let volume_in: f64 = ctx.graph.incoming(account).map(|t| t.amount).sum();
            let volume_out: f64 = ctx.graph.outgoing(account).map(|t| t.amount).sum();
            flat.extend_from_slice(&[
                ctx.graph.in_degree(account) as f64,
                ctx.graph.out_degree(account) as f64,
                volume_in,
                volume_out,
            ]);
        }
        let features =
            Array2::from_shape_vec((n, 4), flat).expect("feature matrix is rows x 4");

        let anomaly = &self.config.anomaly;
        let scores = match scorer {
            Some(scorer) => scorer.fit_score(&features),
            None => {
                let forest = IsolationForest::new(IsolationForestConfig {
                    trees: anomaly.trees,
                    max_samples: anomaly.max_samples,
                    seed: anomaly.seed,
                    contamination: (n >= anomaly.contamination_min_nodes)
                        .then_some(anomaly.contamination),
                });
                forest.fit_score(&features)
            }
        };

        ctx.graph
            .accounts()
            .zip(scores)
            .map(|(account, score)| (account.clone(), score * anomaly.bonus_weight))
            .collect()
    }
}
