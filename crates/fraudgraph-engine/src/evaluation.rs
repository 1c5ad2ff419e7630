//! Detection-quality evaluation against labeled ground truth.
//!
//! When the caller knows which accounts are fraudulent (labeled benchmarks,
//! synthetic batches), this turns a report into a confusion matrix and the
//! usual precision/recall metrics.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use fraudgraph_core::AccountId;

use crate::report::AnalysisReport;

/// Precision/recall summary of one report against ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvaluation {
    /// Flagged accounts that are fraudulent.
    pub true_positives: usize,
    /// Flagged accounts that are clean.
    pub false_positives: usize,
    /// Fraudulent accounts the engine missed.
    pub false_negatives: usize,
    /// Clean accounts left unflagged.
    pub true_negatives: usize,
    /// true_positives / flagged.
    pub precision: f64,
    /// true_positives / fraudulent.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1_score: f64,
}

impl DetectionEvaluation {
    /// Score a report against the set of known fraudulent accounts.
    pub fn from_report(report: &AnalysisReport, known_fraud: &BTreeSet<AccountId>) -> Self {
        let flagged: BTreeSet<&AccountId> = report
            .suspicious_accounts
            .iter()
            .map(|a| &a.account_id)
            .collect();

        let true_positives = flagged.iter().filter(|a| known_fraud.contains(**a)).count();
        let false_positives = flagged.len() - true_positives;
        let false_negatives = known_fraud
            .iter()
            .filter(|a| !flagged.contains(a))
            .count();
        let true_negatives = report
            .summary
            .total_accounts_analyzed
            .saturating_sub(true_positives + false_positives + false_negatives);

        Self::from_confusion(
            true_positives,
            true_negatives,
            false_positives,
            false_negatives,
        )
    }

    /// Build the metrics from raw confusion-matrix counts.
    pub fn from_confusion(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
            precision,
            recall,
            f1_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AnalysisSummary, SuspiciousAccount};

    fn report_flagging(accounts: &[&str], total: usize) -> AnalysisReport {
        AnalysisReport {
            suspicious_accounts: accounts
                .iter()
                .map(|a| SuspiciousAccount {
                    account_id: a.to_string(),
                    suspicion_score: 50.0,
                    detected_patterns: vec![],
                    ring_id: "NONE".to_string(),
                    explanation: String::new(),
                })
                .collect(),
            fraud_rings: vec![],
            summary: AnalysisSummary {
                total_accounts_analyzed: total,
                suspicious_accounts_flagged: accounts.len(),
                fraud_rings_detected: 0,
                processing_time_seconds: 0.0,
            },
        }
    }

    #[test]
    fn test_perfect_detection() {
        let report = report_flagging(&["A", "B"], 10);
        let truth: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let eval = DetectionEvaluation::from_report(&report, &truth);
        assert_eq!(eval.precision, 1.0);
        assert_eq!(eval.recall, 1.0);
        assert_eq!(eval.f1_score, 1.0);
        assert_eq!(eval.true_negatives, 8);
    }

    #[test]
    fn test_partial_detection() {
        let report = report_flagging(&["A", "C"], 10);
        let truth: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let eval = DetectionEvaluation::from_report(&report, &truth);
        assert_eq!(eval.true_positives, 1);
        assert_eq!(eval.false_positives, 1);
        assert_eq!(eval.false_negatives, 1);
        assert_eq!(eval.precision, 0.5);
        assert_eq!(eval.recall, 0.5);
    }

    #[test]
    fn test_empty_report_and_truth() {
        let report = report_flagging(&[], 5);
        let eval = DetectionEvaluation::from_report(&report, &BTreeSet::new());
        assert_eq!(eval.precision, 0.0);
        assert_eq!(eval.recall, 0.0);
        assert_eq!(eval.true_negatives, 5);
    }
}
