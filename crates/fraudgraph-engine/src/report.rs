//! The analysis output document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fraudgraph_core::{AccountId, FraudRing};

use crate::context::AnalysisContext;

/// One flagged account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    /// Account identifier.
    pub account_id: AccountId,
    /// Final suspicion score; at least the flag threshold.
    pub suspicion_score: f64,
    /// Surviving labels, sorted ascending.
    pub detected_patterns: Vec<String>,
    /// Ring membership, or "NONE".
    pub ring_id: String,
    /// Human-readable score breakdown.
    pub explanation: String,
}

/// Run-level counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Distinct accounts in the batch.
    pub total_accounts_analyzed: usize,
    /// Accounts with a non-zero final score.
    pub suspicious_accounts_flagged: usize,
    /// Final fraud rings.
    pub fraud_rings_detected: usize,
    /// Wall-clock analysis time, rounded to two decimals.
    pub processing_time_seconds: f64,
}

/// The full result document of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Flagged accounts sorted by (-score, account_id).
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    /// Rings in assignment order.
    pub fraud_rings: Vec<FraudRing>,
    /// Run-level counters.
    pub summary: AnalysisSummary,
}

/// Assemble the report from a finished context.
pub fn build_report(ctx: &AnalysisContext, processing_time_seconds: f64) -> AnalysisReport {
    // First ring (in assignment order) that contains each account.
    let mut account_ring: BTreeMap<&AccountId, &str> = BTreeMap::new();
    for ring in &ctx.fraud_rings {
        for account in &ring.member_accounts {
            account_ring.entry(account).or_insert(&ring.ring_id);
        }
    }

    let mut suspicious_accounts: Vec<SuspiciousAccount> = ctx
        .suspicion_scores
        .iter()
        .filter(|(_, score)| **score > 0.0)
        .map(|(account, score)| SuspiciousAccount {
            account_id: account.clone(),
            suspicion_score: *score,
            detected_patterns: ctx
                .labels_of(account)
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            ring_id: account_ring
                .get(account)
                .map_or_else(|| "NONE".to_string(), |id| id.to_string()),
            explanation: ctx.explanations.get(account).cloned().unwrap_or_default(),
        })
        .collect();
    suspicious_accounts.sort_by(|a, b| {
        b.suspicion_score
            .partial_cmp(&a.suspicion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    AnalysisReport {
        summary: AnalysisSummary {
            total_accounts_analyzed: ctx.graph.node_count(),
            suspicious_accounts_flagged: suspicious_accounts.len(),
            fraud_rings_detected: ctx.fraud_rings.len(),
            processing_time_seconds: (processing_time_seconds * 100.0).round() / 100.0,
        },
        suspicious_accounts,
        fraud_rings: ctx.fraud_rings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let report = AnalysisReport {
            suspicious_accounts: vec![SuspiciousAccount {
                account_id: "ACC_1".to_string(),
                suspicion_score: 76.0,
                detected_patterns: vec!["cycle_length_3".to_string()],
                ring_id: "RING_001".to_string(),
                explanation: "Cycle Length 3 (+30 pts). Score: 76.0.".to_string(),
            }],
            fraud_rings: vec![FraudRing {
                ring_id: "RING_001".to_string(),
                member_accounts: vec!["ACC_1".to_string(), "ACC_2".to_string(), "ACC_3".to_string()],
                pattern_type: "cycle".to_string(),
                risk_score: 76.0,
            }],
            summary: AnalysisSummary {
                total_accounts_analyzed: 3,
                suspicious_accounts_flagged: 1,
                fraud_rings_detected: 1,
                processing_time_seconds: 0.01,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["suspicious_accounts"][0]["account_id"], "ACC_1");
        assert_eq!(json["fraud_rings"][0]["ring_id"], "RING_001");
        assert_eq!(json["summary"]["total_accounts_analyzed"], 3);

        let back: AnalysisReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
