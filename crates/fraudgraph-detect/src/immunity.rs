//! Business-immunity identification: payroll and merchant accounts.
//!
//! Runs before candidate detection. Immunity never blocks detection itself;
//! it removes accounts from ring membership and, during suppression, zeroes
//! scores unless a strong-fraud label is present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fraudgraph_core::{AccountId, PatternLabel, TransactionGraph};

/// Why an account is immune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmunityKind {
    /// Dominant-sender salary disbursement target.
    Payroll,
    /// High-fan-in collection account with negligible outbound.
    Merchant,
}

impl ImmunityKind {
    /// Pattern label corresponding to the immunity kind.
    pub fn label(&self) -> PatternLabel {
        match self {
            ImmunityKind::Payroll => PatternLabel::Payroll,
            ImmunityKind::Merchant => PatternLabel::Merchant,
        }
    }
}

/// Account -> immunity kind, computed once and read-only afterwards.
pub type ImmunityMap = BTreeMap<AccountId, ImmunityKind>;

/// Thresholds for the immunity rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmunityConfig {
    /// Minimum inbound transactions for payroll detection.
    pub payroll_min_inbound: usize,
    /// Share of inbound volume the dominant sender must exceed.
    pub payroll_dominant_ratio: f64,
    /// Outbound transaction count treated as "no redistribution".
    pub payroll_max_outbound: usize,
    /// Outbound/inbound volume ratio treated as "no redistribution".
    pub payroll_max_out_ratio: f64,
    /// Minimum distinct inbound senders for merchant detection.
    pub merchant_min_senders: usize,
    /// Outbound transaction count treated as negligible.
    pub merchant_max_outbound: usize,
    /// Outbound/inbound volume ratio treated as negligible.
    pub merchant_max_out_ratio: f64,
}

impl Default for ImmunityConfig {
    fn default() -> Self {
        Self {
            payroll_min_inbound: 4,
            payroll_dominant_ratio: 0.7,
            payroll_max_outbound: 3,
            payroll_max_out_ratio: 0.1,
            merchant_min_senders: 10,
            merchant_max_outbound: 2,
            merchant_max_out_ratio: 0.05,
        }
    }
}

/// Identify payroll and merchant accounts. Payroll is evaluated first;
/// merchant only applies when payroll did not match.
pub fn detect_immunity(graph: &TransactionGraph, config: &ImmunityConfig) -> ImmunityMap {
    let mut immunity = ImmunityMap::new();

    for account in graph.accounts() {
        let mut in_sum = 0.0;
        let mut in_count = 0usize;
        let mut sender_volumes: BTreeMap<&AccountId, f64> = BTreeMap::new();
        for (peer, edges) in graph.incoming_by_peer(account) {
            for &idx in edges {
                let amount = graph.tx(idx).amount;
                in_sum += amount;
                in_count += 1;
                *sender_volumes.entry(peer).or_insert(0.0) += amount;
            }
        }

        let mut out_sum = 0.0;
        let mut out_count = 0usize;
        for tx in graph.outgoing(account) {
            out_sum += tx.amount;
            out_count += 1;
        }

        if in_count >= config.payroll_min_inbound && in_sum > 0.0 {
            let max_sender_volume = sender_volumes
                .values()
                .fold(0.0f64, |acc, &v| acc.max(v));
            let dominant_ratio = max_sender_volume / in_sum;
            let no_redistribution = out_count <= config.payroll_max_outbound
                || out_sum / in_sum < config.payroll_max_out_ratio;
            if dominant_ratio > config.payroll_dominant_ratio && no_redistribution {
                immunity.insert(account.clone(), ImmunityKind::Payroll);
                continue;
            }
        }

        if sender_volumes.len() >= config.merchant_min_senders {
            let negligible_out = out_count <= config.merchant_max_outbound
                || (in_sum > 0.0 && out_sum / in_sum < config.merchant_max_out_ratio);
            if negligible_out {
                immunity.insert(account.clone(), ImmunityKind::Merchant);
            }
        }
    }

    immunity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{graph_of, tx_at};

    #[test]
    fn test_payroll_detected() {
        // One employer pays EMP 5 times; EMP barely redistributes.
        let mut txs = Vec::new();
        for i in 0..5 {
            txs.push(tx_at("EMPLOYER", "EMP", 3000.0, i));
        }
        txs.push(tx_at("EMP", "SHOP", 100.0, 10));
        let g = graph_of(txs);
        let immunity = detect_immunity(&g, &ImmunityConfig::default());
        assert_eq!(immunity.get("EMP"), Some(&ImmunityKind::Payroll));
        assert!(!immunity.contains_key("EMPLOYER"));
    }

    #[test]
    fn test_merchant_detected() {
        let mut txs = Vec::new();
        for i in 0..12 {
            txs.push(tx_at(&format!("C{i:02}"), "STORE", 40.0, i));
        }
        let g = graph_of(txs);
        let immunity = detect_immunity(&g, &ImmunityConfig::default());
        assert_eq!(immunity.get("STORE"), Some(&ImmunityKind::Merchant));
    }

    #[test]
    fn test_payroll_wins_over_merchant() {
        // 10+ senders but one dominant: payroll rule fires first.
        let mut txs = Vec::new();
        for i in 0..11 {
            txs.push(tx_at(&format!("S{i:02}"), "ACCT", 10.0, i));
        }
        for i in 0..4 {
            txs.push(tx_at("BIG", "ACCT", 5000.0, 20 + i));
        }
        let g = graph_of(txs);
        let immunity = detect_immunity(&g, &ImmunityConfig::default());
        assert_eq!(immunity.get("ACCT"), Some(&ImmunityKind::Payroll));
    }

    #[test]
    fn test_redistributing_account_not_immune() {
        let mut txs = Vec::new();
        for i in 0..5 {
            txs.push(tx_at("EMPLOYER", "MULE", 1000.0, i));
        }
        for i in 0..6 {
            txs.push(tx_at("MULE", &format!("D{i}"), 800.0, 10 + i));
        }
        let g = graph_of(txs);
        let immunity = detect_immunity(&g, &ImmunityConfig::default());
        assert!(!immunity.contains_key("MULE"));
    }
}
