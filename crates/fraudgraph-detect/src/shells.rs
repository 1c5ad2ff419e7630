//! Shell-network detection: pass-through candidates, chain walking, and
//! hardening of the resulting chains into candidate rings.
//!
//! A shell is a low-degree account that forwards most of what it receives
//! within a short window. Chains of shells between two non-shell endpoints
//! are the detection unit; a hardened chain becomes a candidate ring.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fraudgraph_core::{
    round1, AccountId, AdaptiveStats, CandidateKind, CandidateRing, PatternLabel, PatternSet,
    Transaction, TransactionGraph,
};

use crate::immunity::ImmunityMap;

/// Thresholds and budgets for shell detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Cap on accepted shell rings.
    pub max_shell_rings: usize,
    /// Cap on chains emitted per source node.
    pub max_chains_per_source: usize,
    /// Maximum chain length in nodes (source + intermediaries + sink).
    pub max_path_nodes: usize,
    /// Forwarding window for the temporal pass-through test, in hours.
    pub passthrough_window_hours: i64,
    /// Minimum matched pass-through ratio.
    pub min_passthrough_ratio: f64,
    /// Minimum out/in ratio for the dense-graph fallback test.
    pub min_simple_ratio: f64,
    /// Hardening: maximum members per chain.
    pub max_members: usize,
    /// Hardening: maximum average total degree.
    pub max_avg_degree: f64,
    /// Hardening: maximum single-node total degree.
    pub max_node_degree: usize,
    /// Hardening: external edges may not exceed this multiple of internal.
    pub max_external_ratio: f64,
    /// Hardening: maximum |in - out| / (in + out) amount imbalance.
    pub max_amount_imbalance: f64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_shell_rings: 50,
            max_chains_per_source: 50,
            max_path_nodes: 4,
            passthrough_window_hours: 48,
            min_passthrough_ratio: 0.70,
            min_simple_ratio: 0.50,
            max_members: 12,
            max_avg_degree: 4.0,
            max_node_degree: 8,
            max_external_ratio: 0.5,
            max_amount_imbalance: 0.3,
        }
    }
}

/// Output of shell detection.
#[derive(Debug, Default)]
pub struct ShellDetection {
    /// Hardened shell chains as candidate rings, in acceptance order.
    pub candidates: Vec<CandidateRing>,
    /// `shell_account` for every member of every accepted chain (endpoints
    /// and immune members included; cleanup strips the latter).
    pub labels: BTreeMap<AccountId, PatternSet>,
}

/// Detect shell chains and emit hardened candidate rings.
pub fn detect_shells(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    immunity: &ImmunityMap,
    config: &ShellConfig,
) -> ShellDetection {
    let shell_candidates = shell_candidates(graph, stats, config);
    if shell_candidates.is_empty() {
        return ShellDetection::default();
    }
    debug!(candidates = shell_candidates.len(), "shell candidates");

    // Strict chains are required in dense graphs to separate shells from
    // high-degree noise.
    let min_intermediaries = if stats.is_dense() { 2 } else { 1 };
    let mut chains: Vec<Vec<AccountId>> = Vec::new();
    for node in graph.accounts() {
        if shell_candidates.contains(node) {
            continue;
        }
        walk_chains(graph, node, &shell_candidates, min_intermediaries, config, &mut chains);
    }

    harden_chains(graph, immunity, config, chains)
}

/// A node is a shell candidate when its degree is inside the adaptive band,
/// it passes a pass-through test, and it sits between distinct peers.
fn shell_candidates(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    config: &ShellConfig,
) -> BTreeSet<AccountId> {
    let max_degree = stats.max_shell_degree();
    let mut candidates = BTreeSet::new();

    for node in graph.accounts() {
        let degree = graph.degree(node);
        if degree < 2 || degree > max_degree {
            continue;
        }

        let in_edges: Vec<&Transaction> = graph.incoming(node).collect();
        let mut out_edges: Vec<&Transaction> = graph.outgoing(node).collect();
        if in_edges.is_empty() || out_edges.is_empty() {
            continue;
        }
        out_edges.sort_by_key(|t| t.timestamp);

        let total_in: f64 = in_edges.iter().map(|t| t.amount).sum();
        let total_out: f64 = out_edges.iter().map(|t| t.amount).sum();

        // Matched pass-through: each inbound pairs with the earliest
        // outbound inside the forwarding window; amounts are not consumed.
        let window = Duration::hours(config.passthrough_window_hours);
        let mut passed = 0.0;
        for ie in &in_edges {
            let first_after = out_edges.partition_point(|oe| oe.timestamp < ie.timestamp);
            if let Some(oe) = out_edges.get(first_after) {
                if oe.timestamp - ie.timestamp <= window {
                    passed += ie.amount.min(oe.amount);
                }
            }
        }

        let passes_temporal = total_in > 0.0 && passed / total_in >= config.min_passthrough_ratio;
        let passes_simple = total_in > 0.0 && total_out / total_in >= config.min_simple_ratio;
        if !passes_temporal && !(stats.is_dense() && passes_simple) {
            continue;
        }

        // Needs a real upstream and downstream, not a bounce.
        let has_throughput = graph.predecessors(node).any(|pred| {
            pred != node
                && graph
                    .successors(node)
                    .any(|succ| succ != node && succ != pred)
        });
        if has_throughput {
            candidates.insert(node.clone());
        }
    }

    candidates
}

/// Depth-bounded DFS from a non-candidate source. A path is emitted when it
/// steps off the candidate set with enough shell intermediaries in between.
fn walk_chains(
    graph: &TransactionGraph,
    start: &AccountId,
    shell_candidates: &BTreeSet<AccountId>,
    min_intermediaries: usize,
    config: &ShellConfig,
    chains: &mut Vec<Vec<AccountId>>,
) {
    let mut stack: Vec<(AccountId, Vec<AccountId>)> =
        vec![(start.clone(), vec![start.clone()])];
    let mut paths_found = 0usize;

    while !stack.is_empty() {
        if paths_found >= config.max_chains_per_source {
            break;
        }
        let (current, path) = stack.pop().expect("stack checked non-empty");
        if path.len() >= config.max_path_nodes {
            continue;
        }

        for neighbor in graph.successors(&current) {
            if path.contains(neighbor) {
                continue;
            }
            let mut new_path = path.clone();
            new_path.push(neighbor.clone());

            if shell_candidates.contains(neighbor) {
                stack.push((neighbor.clone(), new_path));
            } else {
                let intermediaries = new_path[1..new_path.len() - 1]
                    .iter()
                    .filter(|n| shell_candidates.contains(*n))
                    .count();
                if intermediaries >= min_intermediaries {
                    chains.push(new_path);
                    paths_found += 1;
                }
            }
        }
    }
}

/// Deduplicate chains, apply the five hardening rules, and emit candidate
/// rings up to the shell-ring cap.
fn harden_chains(
    graph: &TransactionGraph,
    immunity: &ImmunityMap,
    config: &ShellConfig,
    chains: Vec<Vec<AccountId>>,
) -> ShellDetection {
    let mut detection = ShellDetection::default();
    let mut seen: BTreeSet<BTreeSet<AccountId>> = BTreeSet::new();

    for chain in chains {
        if detection.candidates.len() >= config.max_shell_rings {
            debug!(cap = config.max_shell_rings, "shell ring cap reached");
            break;
        }

        let non_immune: Vec<AccountId> = chain
            .iter()
            .filter(|a| !immunity.contains_key(*a))
            .cloned()
            .collect();
        if non_immune.len() < 3 {
            continue;
        }
        let member_set: BTreeSet<AccountId> = non_immune.iter().cloned().collect();
        if seen.contains(&member_set) {
            continue;
        }

        if member_set.len() > config.max_members {
            continue;
        }

        let degrees: Vec<usize> = member_set.iter().map(|m| graph.degree(m)).collect();
        let avg_degree = degrees.iter().sum::<usize>() as f64 / member_set.len() as f64;
        if avg_degree > config.max_avg_degree {
            continue;
        }
        if degrees.iter().copied().max().unwrap_or(0) > config.max_node_degree {
            continue;
        }

        // Distinct-successor counting for internal vs. external reach.
        let mut internal = 0usize;
        let mut external = 0usize;
        for m in &member_set {
            for succ in graph.successors(m) {
                if member_set.contains(succ) {
                    internal += 1;
                } else {
                    external += 1;
                }
            }
        }
        if internal > 0 && external as f64 > internal as f64 * config.max_external_ratio {
            continue;
        }

        let mut total_in = 0.0;
        let mut total_out = 0.0;
        for m in &member_set {
            total_in += graph.incoming(m).map(|t| t.amount).sum::<f64>();
            total_out += graph.outgoing(m).map(|t| t.amount).sum::<f64>();
        }
        let total = total_in + total_out;
        if total > 0.0 && (total_in - total_out).abs() / total > config.max_amount_imbalance {
            continue;
        }

        seen.insert(member_set.clone());

        let mut confidence = 0.5;
        if internal > 0 && external as f64 <= internal as f64 * 0.2 {
            confidence += 0.1;
        }
        let max_possible = member_set.len() * (member_set.len() - 1);
        if max_possible > 0 && internal as f64 / max_possible as f64 >= 0.3 {
            confidence += 0.1;
        }
        confidence -= member_set.len() as f64 * 0.02;

        let mut members: Vec<AccountId> = non_immune;
        members.sort();
        detection.candidates.push(CandidateRing {
            members,
            kind: CandidateKind::ShellNetwork,
            risk_score: round1((55.0 + chain.len() as f64 * 5.0).min(100.0)),
            confidence: confidence.clamp(0.1, 1.0),
        });

        for account in &chain {
            detection
                .labels
                .entry(account.clone())
                .or_default()
                .insert(PatternLabel::ShellAccount);
        }
    }

    detection
}
