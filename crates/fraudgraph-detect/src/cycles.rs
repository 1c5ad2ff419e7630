//! Cycle detection: budgeted DFS, multi-constraint edge validation, and
//! size-bounded union-find merging into candidate rings.
//!
//! A cycle only counts when some combination of its parallel edges clears
//! all four constraints (temporal span, amount uniformity, flow
//! conservation, external degree). Validated cycles sharing accounts are
//! merged into one component unless the merge would exceed the ring-size
//! bound.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use fraudgraph_core::{
    round1, AccountId, AdaptiveStats, CandidateKind, CandidateRing, PatternLabel, PatternSet,
    TransactionGraph, UnionFind,
};

use crate::immunity::ImmunityMap;

/// Budgets and constraint thresholds for cycle detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Maximum cycle length (DFS path length bound).
    pub max_depth: usize,
    /// DFS budget per start node, counted in stack pops.
    pub max_ops_per_node: usize,
    /// Global cap on validated cycles.
    pub max_cycles: usize,
    /// Union-find component bound; merges beyond it are rejected.
    pub max_ring_size: usize,
    /// Temporal span ceiling for one cycle, in hours (inclusive).
    pub max_span_hours: i64,
    /// Maximum relative deviation of each edge amount from the mean.
    pub amount_tolerance: f64,
    /// Minimum min/max amount ratio across the cycle.
    pub min_flow_ratio: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_ops_per_node: 5000,
            max_cycles: 2000,
            max_ring_size: 30,
            max_span_hours: 72,
            amount_tolerance: 0.15,
            min_flow_ratio: 0.70,
        }
    }
}

/// Output of cycle detection.
#[derive(Debug, Default)]
pub struct CycleDetection {
    /// Candidate rings, one per merged component with >= 3 non-immune
    /// members, ordered by smallest member.
    pub candidates: Vec<CandidateRing>,
    /// `cycle_length_L` labels for every node of every validated cycle,
    /// immune accounts included.
    pub labels: BTreeMap<AccountId, PatternSet>,
}

struct ValidatedCycle {
    nodes: Vec<AccountId>,
    edges: Vec<usize>,
}

/// Detect validated cycles of length 3..=5 and merge them into candidate
/// rings.
pub fn detect_cycles(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    immunity: &ImmunityMap,
    config: &CycleConfig,
) -> CycleDetection {
    let adjacency = eligible_adjacency(graph, stats);
    let found = find_cycles(graph, stats, &adjacency, config);
    debug!(cycles = found.len(), "validated cycles");
    if found.is_empty() {
        return CycleDetection::default();
    }

    let mut detection = CycleDetection::default();

    // Every node of a validated cycle gets the length label, immune or not.
    let mut cycle_lengths: BTreeMap<&AccountId, BTreeSet<usize>> = BTreeMap::new();
    for cycle in &found {
        for node in &cycle.nodes {
            cycle_lengths.entry(node).or_default().insert(cycle.nodes.len());
        }
    }
    for (node, lengths) in &cycle_lengths {
        let set = detection.labels.entry((*node).clone()).or_default();
        for &length in lengths {
            if let Some(label) = PatternLabel::cycle_of_length(length) {
                set.insert(label);
            }
        }
    }

    // Size-bounded union-find merge.
    let mut uf = UnionFind::new();
    let mut group_sizes: HashMap<AccountId, usize> = HashMap::new();
    for cycle in &found {
        let roots: BTreeSet<AccountId> =
            cycle.nodes.iter().map(|n| uf.find(n)).collect();
        let merged_size: usize = roots
            .iter()
            .map(|r| group_sizes.get(r).copied().unwrap_or(1))
            .sum();
        if merged_size > config.max_ring_size {
            continue;
        }
        let anchor = &cycle.nodes[0];
        for node in &cycle.nodes[1..] {
            uf.union(anchor, node);
        }
        let new_root = uf.find(anchor);
        group_sizes.insert(new_root, merged_size);
    }

    // Emit one candidate per component, ordered by smallest member.
    let mut components: Vec<Vec<AccountId>> =
        uf.groups().into_values().collect();
    components.sort();

    // A component becomes a candidate when enough non-immune members back
    // it. Immune members stay in the ring: every cycle member carries a
    // strong-fraud label, which immunity does not override.
    for members in components {
        let non_immune: Vec<AccountId> = members
            .iter()
            .filter(|m| !immunity.contains_key(*m))
            .cloned()
            .collect();
        if non_immune.len() < 3 {
            continue;
        }

        let mut all_lengths: BTreeSet<usize> = BTreeSet::new();
        for m in &non_immune {
            if let Some(lengths) = cycle_lengths.get(m) {
                all_lengths.extend(lengths.iter().copied());
            }
        }

        let mut confidence: f64 = 0.9;
        if all_lengths.first() == Some(&3) {
            confidence += 0.05;
        }
        let member_set: BTreeSet<&AccountId> = non_immune.iter().collect();
        let mut external = 0usize;
        for m in &non_immune {
            external += graph
                .successors(m)
                .filter(|s| !member_set.contains(s))
                .count();
            external += graph
                .predecessors(m)
                .filter(|p| !member_set.contains(p))
                .count();
        }
        let avg_external = external as f64 / non_immune.len().max(1) as f64;
        if avg_external <= 2.0 {
            confidence += 0.05;
        }

        let mut risk = 50.0;
        if let Some(&min_length) = all_lengths.first() {
            risk += (5i64 - min_length as i64) as f64 * 10.0;
        }
        risk += (non_immune.len() as f64 * 2.0).min(30.0);

        detection.candidates.push(CandidateRing {
            members,
            kind: CandidateKind::Cycle,
            risk_score: round1(risk.min(100.0)),
            confidence: confidence.min(1.0),
        });
    }

    detection
}

/// Simple-edge adjacency over degree-eligible nodes, successors sorted.
/// Self-loops are excluded.
fn eligible_adjacency(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
) -> BTreeMap<AccountId, Vec<AccountId>> {
    let max_degree = stats.max_cycle_degree();
    let eligible: BTreeSet<&AccountId> = graph
        .accounts()
        .filter(|a| {
            let degree = graph.degree(a.as_str());
            degree >= 2 && degree <= max_degree
        })
        .collect();

    let mut adjacency: BTreeMap<AccountId, Vec<AccountId>> = BTreeMap::new();
    for &u in &eligible {
        let successors: Vec<AccountId> = graph
            .successors(u)
            .filter(|v| *v != u && eligible.contains(v))
            .cloned()
            .collect();
        if !successors.is_empty() {
            adjacency.insert(u.clone(), successors);
        }
    }
    adjacency
}

/// Bounded iterative DFS over the eligible adjacency, deduplicating by the
/// minimal lexicographic rotation. A canonical form is only recorded once a
/// cycle passes validation, so a rejected rotation can be retried from a
/// later start node within the budgets.
fn find_cycles(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    adjacency: &BTreeMap<AccountId, Vec<AccountId>>,
    config: &CycleConfig,
) -> Vec<ValidatedCycle> {
    let mut found = Vec::new();
    let mut seen: HashSet<Vec<AccountId>> = HashSet::new();

    for start in adjacency.keys() {
        if found.len() >= config.max_cycles {
            debug!(cap = config.max_cycles, "cycle cap reached");
            break;
        }

        let mut stack: Vec<(AccountId, Vec<AccountId>, BTreeSet<AccountId>)> = vec![(
            start.clone(),
            vec![start.clone()],
            BTreeSet::from([start.clone()]),
        )];
        let mut ops = 0usize;

        while !stack.is_empty() {
            ops += 1;
            if ops > config.max_ops_per_node {
                break;
            }
            let (current, path, visited) = stack.pop().expect("stack checked non-empty");
            if path.len() > config.max_depth {
                continue;
            }

            for neighbor in adjacency.get(&current).map_or(&[][..], Vec::as_slice) {
                if neighbor == start && path.len() >= 3 {
                    let canonical = canonicalize_cycle(&path);
                    if !seen.contains(&canonical) {
                        if let Some(cycle) = validate_cycle(graph, stats, &path, config) {
                            seen.insert(canonical);
                            found.push(cycle);
                        }
                    }
                    continue;
                }
                if visited.contains(neighbor) {
                    continue;
                }
                if path.len() >= config.max_depth {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(neighbor.clone());
                let mut new_visited = visited.clone();
                new_visited.insert(neighbor.clone());
                stack.push((neighbor.clone(), new_path, new_visited));
            }
        }
    }

    found
}

/// Minimal lexicographic rotation of a cycle's node list.
fn canonicalize_cycle(path: &[AccountId]) -> Vec<AccountId> {
    let min_idx = path
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| *node)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut canonical = path[min_idx..].to_vec();
    canonical.extend_from_slice(&path[..min_idx]);
    canonical
}

/// Search the parallel-edge combinations of a cycle path, hop by hop in
/// timestamp order, for one that satisfies every constraint.
fn validate_cycle(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    path: &[AccountId],
    config: &CycleConfig,
) -> Option<ValidatedCycle> {
    let n = path.len();
    let mut edge_lists: Vec<&[usize]> = Vec::with_capacity(n);
    for i in 0..n {
        let edges = graph.edges_between(&path[i], &path[(i + 1) % n]);
        if edges.is_empty() {
            return None;
        }
        edge_lists.push(edges);
    }

    let mut chosen = Vec::with_capacity(n);
    pick_edges(graph, stats, path, &edge_lists, config, &mut chosen).map(|edges| ValidatedCycle {
        nodes: path.to_vec(),
        edges,
    })
}

fn pick_edges(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    path: &[AccountId],
    edge_lists: &[&[usize]],
    config: &CycleConfig,
    chosen: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    if chosen.len() == edge_lists.len() {
        return check_constraints(graph, stats, path, chosen, config).then(|| chosen.clone());
    }
    for &edge in edge_lists[chosen.len()] {
        chosen.push(edge);
        if let Some(result) = pick_edges(graph, stats, path, edge_lists, config, chosen) {
            return Some(result);
        }
        chosen.pop();
    }
    None
}

/// The four cycle constraints: temporal span, amount uniformity, flow
/// conservation, in-window external degree.
fn check_constraints(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    path: &[AccountId],
    edges: &[usize],
    config: &CycleConfig,
) -> bool {
    let timestamps: Vec<DateTime<Utc>> = edges.iter().map(|&e| graph.tx(e).timestamp).collect();
    let amounts: Vec<f64> = edges.iter().map(|&e| graph.tx(e).amount).collect();

    let ts_min = *timestamps.iter().min().expect("cycle has edges");
    let ts_max = *timestamps.iter().max().expect("cycle has edges");
    if ts_max - ts_min > Duration::hours(config.max_span_hours) {
        return false;
    }

    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if mean == 0.0 {
        return false;
    }
    if !amounts
        .iter()
        .all(|a| (a - mean).abs() / mean <= config.amount_tolerance)
    {
        return false;
    }

    let max_amount = amounts.iter().fold(f64::MIN, |acc, &a| acc.max(a));
    let min_amount = amounts.iter().fold(f64::MAX, |acc, &a| acc.min(a));
    let flow_ratio = if max_amount > 0.0 {
        min_amount / max_amount
    } else {
        0.0
    };
    if flow_ratio < config.min_flow_ratio {
        return false;
    }

    let cycle_set: BTreeSet<&AccountId> = path.iter().collect();
    for node in path {
        if external_degree_in_window(graph, node, &cycle_set, ts_min, ts_max)
            > stats.ext_degree_limit
        {
            return false;
        }
    }
    true
}

/// Count transactions with non-cycle peers inside the cycle's time window,
/// parallel edges included.
fn external_degree_in_window(
    graph: &TransactionGraph,
    node: &str,
    cycle_set: &BTreeSet<&AccountId>,
    ts_min: DateTime<Utc>,
    ts_max: DateTime<Utc>,
) -> usize {
    let in_window = |&idx: &usize| {
        let ts = graph.tx(idx).timestamp;
        ts >= ts_min && ts <= ts_max
    };
    let mut count = 0usize;
    for (peer, edges) in graph.incoming_by_peer(node) {
        if !cycle_set.contains(peer) {
            count += edges.iter().filter(|e| in_window(e)).count();
        }
    }
    for (peer, edges) in graph.outgoing_by_peer(node) {
        if !cycle_set.contains(peer) {
            count += edges.iter().filter(|e| in_window(e)).count();
        }
    }
    count
}
