//! Output invariants over randomized batches.

mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;

use common::origin;
use fraudgraph_core::Transaction;
use fraudgraph_engine::{AnalysisReport, EngineConfig, ForensicsEngine};

fn arbitrary_batch() -> impl Strategy<Value = Vec<Transaction>> {
    let tx = (
        0..12usize,
        0..12usize,
        1.0..12_000.0f64,
        0..720i64,
        0..60i64,
    );
    proptest::collection::vec(tx, 0..120).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (s, r, amount, hours, minutes))| Transaction {
                id: format!("T{i:04}"),
                sender: format!("A{s:02}"),
                receiver: format!("A{r:02}"),
                amount,
                timestamp: origin()
                    + chrono::Duration::hours(hours)
                    + chrono::Duration::minutes(minutes),
            })
            .collect()
    })
}

fn check_invariants(report: &AnalysisReport) {
    // Ring ids are dense, unique, and ordered by final position.
    for (idx, ring) in report.fraud_rings.iter().enumerate() {
        assert_eq!(ring.ring_id, format!("RING_{:03}", idx + 1));
    }

    // Every account belongs to at most one ring; every ring respects the
    // size bounds and is sorted.
    let mut members_seen: BTreeSet<&String> = BTreeSet::new();
    for ring in &report.fraud_rings {
        assert!(ring.member_accounts.len() >= 3, "ring below 3 members");
        if ring.pattern_type != "cycle" {
            assert!(ring.member_accounts.len() <= 15, "non-cycle ring above 15");
        }
        let mut sorted = ring.member_accounts.clone();
        sorted.sort();
        assert_eq!(sorted, ring.member_accounts, "ring members unsorted");
        for account in &ring.member_accounts {
            assert!(members_seen.insert(account), "{account} in two rings");
        }
        assert!((0.0..=100.0).contains(&ring.risk_score));
    }

    // Flagged accounts clear the gate, carry sorted duplicate-free labels,
    // and arrive ordered by (-score, account_id).
    let mut previous: Option<(f64, &String)> = None;
    for account in &report.suspicious_accounts {
        assert!(account.suspicion_score >= 25.0);
        assert!(account.suspicion_score <= 100.0);

        let mut patterns = account.detected_patterns.clone();
        patterns.sort();
        patterns.dedup();
        assert_eq!(patterns, account.detected_patterns);

        // Signal-only label sets can never be flagged.
        let signal_only = account.detected_patterns.iter().all(|p| {
            matches!(
                p.as_str(),
                "high_velocity"
                    | "high_velocity_24h"
                    | "low_variance"
                    | "isolation_cluster"
                    | "payroll"
                    | "merchant"
            )
        });
        assert!(!signal_only, "signal-only account {} flagged", account.account_id);

        if let Some((prev_score, prev_id)) = previous {
            assert!(
                prev_score > account.suspicion_score
                    || (prev_score == account.suspicion_score
                        && prev_id < &account.account_id),
                "suspicious accounts out of order"
            );
        }
        previous = Some((account.suspicion_score, &account.account_id));

        if account.ring_id != "NONE" {
            assert!(report
                .fraud_rings
                .iter()
                .any(|r| r.ring_id == account.ring_id));
        }
    }

    assert_eq!(
        report.summary.suspicious_accounts_flagged,
        report.suspicious_accounts.len()
    );
    assert_eq!(report.summary.fraud_rings_detected, report.fraud_rings.len());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_batches_satisfy_output_invariants(batch in arbitrary_batch()) {
        let engine = ForensicsEngine::new(EngineConfig::default()).unwrap();
        let report = engine.analyze_transactions(batch);
        check_invariants(&report);
    }

    #[test]
    fn analysis_is_deterministic(batch in arbitrary_batch()) {
        let engine = ForensicsEngine::new(EngineConfig::default()).unwrap();
        let mut first = engine.analyze_transactions(batch.clone());
        let mut second = engine.analyze_transactions(batch);
        first.summary.processing_time_seconds = 0.0;
        second.summary.processing_time_seconds = 0.0;
        prop_assert_eq!(first, second);
    }
}
