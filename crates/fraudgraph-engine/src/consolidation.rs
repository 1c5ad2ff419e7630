//! Ring consolidation: smurf-per-core merging followed by global
//! arbitration with exclusive node assignment.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use fraudgraph_core::{round1, AccountId, CandidateKind, CandidateRing, FraudRing};

use crate::config::ArbitrationConfig;

/// Jaccard similarity between two member sets. Two empty sets count as
/// identical.
fn jaccard(a: &BTreeSet<AccountId>, b: &BTreeSet<AccountId>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Index-keyed union-find for the per-core smurf merge.
struct IndexUnionFind {
    parent: Vec<usize>,
}

impl IndexUnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Stage A: group smurfing candidates by core account and merge overlapping
/// windows (Jaccard above the threshold) into one ring per component.
/// Non-smurf candidates pass through ahead of the consolidated smurfs.
pub fn consolidate_smurfs(
    candidates: Vec<CandidateRing>,
    config: &ArbitrationConfig,
) -> Vec<CandidateRing> {
    let (smurfs, mut output): (Vec<CandidateRing>, Vec<CandidateRing>) = candidates
        .into_iter()
        .partition(|c| matches!(c.kind, CandidateKind::Smurfing { .. }));
    if smurfs.is_empty() {
        return output;
    }

    // Group by core in first-seen order.
    let mut order: Vec<AccountId> = Vec::new();
    let mut groups: HashMap<AccountId, Vec<CandidateRing>> = HashMap::new();
    for candidate in smurfs {
        let core = candidate
            .core_account()
            .expect("smurf candidate carries a core")
            .clone();
        if !groups.contains_key(&core) {
            order.push(core.clone());
        }
        groups.entry(core).or_default().push(candidate);
    }

    for core in order {
        let group = groups.remove(&core).expect("core listed in order");
        if group.len() == 1 {
            output.extend(group);
            continue;
        }

        let sets: Vec<BTreeSet<AccountId>> = group
            .iter()
            .map(|c| c.members.iter().cloned().collect())
            .collect();
        let mut uf = IndexUnionFind::new(group.len());
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                if jaccard(&sets[i], &sets[j]) > config.smurf_jaccard_threshold {
                    uf.union(i, j);
                }
            }
        }

        // Components in order of their smallest candidate index.
        let mut components: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut root_to_component: HashMap<usize, usize> = HashMap::new();
        for i in 0..group.len() {
            let root = uf.find(i);
            match root_to_component.get(&root) {
                Some(&pos) => components[pos].1.push(i),
                None => {
                    root_to_component.insert(root, components.len());
                    components.push((root, vec![i]));
                }
            }
        }

        for (_, indices) in components {
            let mut members: BTreeSet<AccountId> = BTreeSet::new();
            let mut best_risk = 0.0f64;
            let mut best_confidence = 0.0f64;
            for &i in &indices {
                members.extend(group[i].members.iter().cloned());
                best_risk = best_risk.max(group[i].risk_score);
                best_confidence = best_confidence.max(group[i].confidence);
            }
            output.push(CandidateRing {
                members: members.into_iter().collect(),
                kind: CandidateKind::Smurfing { core: core.clone() },
                risk_score: round1(best_risk),
                confidence: best_confidence,
            });
        }
    }

    output
}

/// Stage B: global arbitration. Candidates are visited by descending
/// confidence (type priority, then construction order, break ties); each
/// node belongs to at most one final ring.
pub fn arbitrate(
    candidates: Vec<CandidateRing>,
    config: &ArbitrationConfig,
) -> Vec<FraudRing> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut sorted = candidates;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.type_priority().cmp(&b.type_priority()))
    });

    struct PendingRing {
        members: Vec<AccountId>,
        pattern_type: &'static str,
        risk_score: f64,
    }

    let mut rings: Vec<PendingRing> = Vec::new();
    let mut used_nodes: BTreeSet<AccountId> = BTreeSet::new();
    let mut node_to_ring: HashMap<AccountId, usize> = HashMap::new();

    for candidate in sorted {
        let members: BTreeSet<AccountId> = candidate.members.iter().cloned().collect();
        if members.is_empty() {
            continue;
        }
        let overlap: BTreeSet<&AccountId> = members.intersection(&used_nodes).collect();
        let overlap_ratio = overlap.len() as f64 / members.len() as f64;

        if overlap_ratio > config.merge_overlap_ratio {
            // Merge into the ring holding the largest slice of the overlap;
            // ties go to the earliest-accepted ring.
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for node in &overlap {
                if let Some(&idx) = node_to_ring.get(*node) {
                    *counts.entry(idx).or_insert(0) += 1;
                }
            }
            let Some((&target_idx, _)) = counts.iter().max_by_key(|(idx, count)| (**count, std::cmp::Reverse(**idx))) else {
                continue;
            };

            let target = &mut rings[target_idx];
            let current: BTreeSet<AccountId> = target.members.iter().cloned().collect();
            let mut new_nodes: Vec<AccountId> =
                members.difference(&current).cloned().collect();
            if target.pattern_type != "cycle" {
                let budget = config
                    .max_non_cycle_members
                    .saturating_sub(current.len());
                new_nodes.truncate(budget);
            }
            if !new_nodes.is_empty() {
                let mut merged: Vec<AccountId> = current.into_iter().collect();
                merged.extend(new_nodes.iter().cloned());
                merged.sort();
                target.members = merged;
                for node in new_nodes {
                    used_nodes.insert(node.clone());
                    node_to_ring.insert(node, target_idx);
                }
            }
            target.risk_score = target.risk_score.max(candidate.risk_score);
            continue;
        }

        // Accept as a new ring from the still-unclaimed members; exclusive
        // assignment keeps every account in at most one ring.
        let mut ring_members: Vec<AccountId> =
            members.difference(&used_nodes).cloned().collect();
        if !candidate.is_cycle() && ring_members.len() > config.max_non_cycle_members {
            ring_members.truncate(config.max_non_cycle_members);
        }
        if ring_members.len() < config.min_ring_members {
            debug!(
                pattern = candidate.pattern_type(),
                "candidate dropped below minimum ring size"
            );
            continue;
        }

        let ring_idx = rings.len();
        for node in &ring_members {
            used_nodes.insert(node.clone());
            node_to_ring.insert(node.clone(), ring_idx);
        }
        rings.push(PendingRing {
            members: ring_members,
            pattern_type: candidate.pattern_type(),
            risk_score: round1(candidate.risk_score),
        });
    }

    // Deterministic output order: risk descending, pattern type ascending,
    // acceptance order breaks full ties. Ids are dense by final position.
    let mut indexed: Vec<PendingRing> = rings;
    indexed.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.pattern_type.cmp(b.pattern_type))
    });

    indexed
        .into_iter()
        .enumerate()
        .map(|(idx, ring)| FraudRing {
            ring_id: FraudRing::format_id(idx + 1),
            member_accounts: ring.members,
            pattern_type: ring.pattern_type.to_string(),
            risk_score: ring.risk_score,
        })
        .collect()
}
