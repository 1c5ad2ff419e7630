//! Disjoint-set over account ids.
//!
//! Weighted quick-union with path compression. Cycle merging and smurf
//! consolidation both lean on it; callers enforce their own size bounds by
//! inspecting components before unioning.

use std::collections::{BTreeMap, HashMap};

use crate::models::AccountId;

/// Weighted quick-union with path compression.
#[derive(Debug, Default, Clone)]
pub struct UnionFind {
    parent: HashMap<AccountId, AccountId>,
    rank: HashMap<AccountId, u32>,
}

impl UnionFind {
    /// Empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of `x`'s component, inserting `x` as a singleton when unseen.
    pub fn find(&mut self, x: &str) -> AccountId {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.to_string(), x.to_string());
            self.rank.insert(x.to_string(), 0);
            return x.to_string();
        }
        let mut root = x.to_string();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }
        // Path compression.
        let mut current = x.to_string();
        while self.parent[&current] != root {
            let next = self.parent[&current].clone();
            self.parent.insert(current, root.clone());
            current = next;
        }
        root
    }

    /// Join the components of `a` and `b`.
    pub fn union(&mut self, a: &str, b: &str) {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return;
        }
        if self.rank[&ra] < self.rank[&rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent.insert(rb.clone(), ra.clone());
        if self.rank[&ra] == self.rank[&rb] {
            if let Some(rank) = self.rank.get_mut(&ra) {
                *rank += 1;
            }
        }
    }

    /// All components, keyed by root, members sorted. Deterministic
    /// regardless of insertion order.
    pub fn groups(&mut self) -> BTreeMap<AccountId, Vec<AccountId>> {
        let members: Vec<AccountId> = self.parent.keys().cloned().collect();
        let mut groups: BTreeMap<AccountId, Vec<AccountId>> = BTreeMap::new();
        for member in members {
            let root = self.find(&member);
            groups.entry(root).or_default().push(member);
        }
        for group in groups.values_mut() {
            group.sort();
        }
        groups
    }
}
