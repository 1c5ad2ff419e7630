//! Directed transaction multigraph.
//!
//! Accounts are nodes; every transaction is one directed edge, so parallel
//! edges between the same ordered pair are preserved. Adjacency is keyed by
//! peer account in a `BTreeMap`, which makes node and successor iteration
//! lexicographic by construction — the determinism the pipeline relies on.

use std::collections::BTreeMap;

use crate::models::{AccountId, Dataset, Transaction};

#[derive(Debug, Default, Clone)]
struct NodeLinks {
    /// Successor -> indices of parallel edges, in timestamp order.
    out: BTreeMap<AccountId, Vec<usize>>,
    /// Predecessor -> indices of parallel edges, in timestamp order.
    inc: BTreeMap<AccountId, Vec<usize>>,
    out_count: usize,
    in_count: usize,
}

/// Read-only multigraph over one ingested batch.
#[derive(Debug, Default, Clone)]
pub struct TransactionGraph {
    transactions: Vec<Transaction>,
    nodes: BTreeMap<AccountId, NodeLinks>,
}

impl TransactionGraph {
    /// Build the graph from an ingested dataset. Edge index lists follow the
    /// dataset's timestamp order. Self-loops are kept.
    pub fn from_dataset(dataset: Dataset) -> Self {
        let transactions = dataset.transactions;
        let mut nodes: BTreeMap<AccountId, NodeLinks> = BTreeMap::new();
        for (idx, tx) in transactions.iter().enumerate() {
            let sender = nodes.entry(tx.sender.clone()).or_default();
            sender.out.entry(tx.receiver.clone()).or_default().push(idx);
            sender.out_count += 1;

            let receiver = nodes.entry(tx.receiver.clone()).or_default();
            receiver.inc.entry(tx.sender.clone()).or_default().push(idx);
            receiver.in_count += 1;
        }
        Self {
            transactions,
            nodes,
        }
    }

    /// All transactions, timestamp-sorted.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transaction behind an edge index.
    pub fn tx(&self, idx: usize) -> &Transaction {
        &self.transactions[idx]
    }

    /// Account ids in lexicographic order.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.nodes.keys()
    }

    /// Number of distinct accounts.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges (= transactions).
    pub fn edge_count(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the account appears in the batch.
    pub fn contains(&self, account: &str) -> bool {
        self.nodes.contains_key(account)
    }

    /// In-degree counting parallel edges.
    pub fn in_degree(&self, account: &str) -> usize {
        self.nodes.get(account).map_or(0, |n| n.in_count)
    }

    /// Out-degree counting parallel edges.
    pub fn out_degree(&self, account: &str) -> usize {
        self.nodes.get(account).map_or(0, |n| n.out_count)
    }

    /// Total degree counting parallel edges.
    pub fn degree(&self, account: &str) -> usize {
        self.in_degree(account) + self.out_degree(account)
    }

    /// Distinct successors, lexicographic.
    pub fn successors(&self, account: &str) -> impl Iterator<Item = &AccountId> {
        self.nodes
            .get(account)
            .into_iter()
            .flat_map(|n| n.out.keys())
    }

    /// Distinct predecessors, lexicographic.
    pub fn predecessors(&self, account: &str) -> impl Iterator<Item = &AccountId> {
        self.nodes
            .get(account)
            .into_iter()
            .flat_map(|n| n.inc.keys())
    }

    /// Distinct undirected neighbors, lexicographic and duplicate-free.
    pub fn neighbors(&self, account: &str) -> Vec<&AccountId> {
        let mut merged: Vec<&AccountId> = self
            .predecessors(account)
            .chain(self.successors(account))
            .collect();
        merged.sort();
        merged.dedup();
        merged
    }

    /// Outgoing transactions, grouped by successor in lexicographic order.
    pub fn outgoing_by_peer(
        &self,
        account: &str,
    ) -> impl Iterator<Item = (&AccountId, &[usize])> {
        self.nodes
            .get(account)
            .into_iter()
            .flat_map(|n| n.out.iter().map(|(peer, idxs)| (peer, idxs.as_slice())))
    }

    /// Incoming transactions, grouped by predecessor in lexicographic order.
    pub fn incoming_by_peer(
        &self,
        account: &str,
    ) -> impl Iterator<Item = (&AccountId, &[usize])> {
        self.nodes
            .get(account)
            .into_iter()
            .flat_map(|n| n.inc.iter().map(|(peer, idxs)| (peer, idxs.as_slice())))
    }

    /// All outgoing transactions of an account.
    pub fn outgoing(&self, account: &str) -> impl Iterator<Item = &Transaction> {
        self.outgoing_by_peer(account)
            .flat_map(|(_, idxs)| idxs.iter().map(|&i| self.tx(i)))
    }

    /// All incoming transactions of an account.
    pub fn incoming(&self, account: &str) -> impl Iterator<Item = &Transaction> {
        self.incoming_by_peer(account)
            .flat_map(|(_, idxs)| idxs.iter().map(|&i| self.tx(i)))
    }

    /// Parallel edges from `u` to `v`, in timestamp order.
    pub fn edges_between(&self, u: &str, v: &str) -> &[usize] {
        self.nodes
            .get(u)
            .and_then(|n| n.out.get(v))
            .map_or(&[], |idxs| idxs.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, sender: &str, receiver: &str, amount: f64, hour: u32) -> Transaction {
        Transaction {
            id: id.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    fn graph(transactions: Vec<Transaction>) -> TransactionGraph {
        TransactionGraph::from_dataset(Dataset::from_transactions(transactions))
    }

    #[test]
    fn test_degrees_count_parallel_edges() {
        let g = graph(vec![
            tx("T1", "A", "B", 100.0, 1),
            tx("T2", "A", "B", 200.0, 2),
            tx("T3", "B", "C", 50.0, 3),
        ]);
        assert_eq!(g.out_degree("A"), 2);
        assert_eq!(g.in_degree("B"), 2);
        assert_eq!(g.degree("B"), 3);
        assert_eq!(g.edges_between("A", "B").len(), 2);
        assert_eq!(g.successors("A").count(), 1);
    }

    #[test]
    fn test_accounts_sorted() {
        let g = graph(vec![tx("T1", "Z", "M", 1.0, 1), tx("T2", "A", "Z", 1.0, 2)]);
        let accounts: Vec<&str> = g.accounts().map(String::as_str).collect();
        assert_eq!(accounts, vec!["A", "M", "Z"]);
    }

    #[test]
    fn test_neighbors_undirected_dedup() {
        let g = graph(vec![
            tx("T1", "A", "B", 1.0, 1),
            tx("T2", "B", "A", 1.0, 2),
            tx("T3", "C", "B", 1.0, 3),
        ]);
        let neighbors: Vec<&str> = g.neighbors("B").into_iter().map(String::as_str).collect();
        assert_eq!(neighbors, vec!["A", "C"]);
    }

    #[test]
    fn test_self_loop_preserved() {
        let g = graph(vec![tx("T1", "A", "A", 1.0, 1)]);
        assert_eq!(g.degree("A"), 2);
        assert_eq!(g.edges_between("A", "A").len(), 1);
        assert_eq!(g.neighbors("A"), vec!["A"]);
    }

    #[test]
    fn test_edges_between_timestamp_order() {
        let g = graph(vec![
            tx("T2", "A", "B", 2.0, 5),
            tx("T1", "A", "B", 1.0, 1),
        ]);
        let amounts: Vec<f64> = g
            .edges_between("A", "B")
            .iter()
            .map(|&i| g.tx(i).amount)
            .collect();
        assert_eq!(amounts, vec![1.0, 2.0]);
    }
}
