//! Candidate and final fraud-ring models.

use serde::{Deserialize, Serialize};

use super::transaction::AccountId;

/// Which detector proposed a candidate ring, with per-variant payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Validated circular flows merged into one component.
    Cycle,
    /// A hardened shell chain.
    ShellNetwork,
    /// A smurfing window around one collection hub.
    Smurfing {
        /// The hub the funds fanned into (kept even when the hub itself is
        /// immune; per-core consolidation groups on it).
        core: AccountId,
    },
}

/// A pre-arbitration ring proposal from a single detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRing {
    /// Sorted member accounts; at least 3 at emission.
    pub members: Vec<AccountId>,
    /// Proposing detector and payload.
    pub kind: CandidateKind,
    /// Risk score in [0, 100], one decimal.
    pub risk_score: f64,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
}

impl CandidateRing {
    /// Pattern-type string used in the output document.
    pub fn pattern_type(&self) -> &'static str {
        match self.kind {
            CandidateKind::Cycle => "cycle",
            CandidateKind::ShellNetwork => "shell_network",
            CandidateKind::Smurfing { .. } => "smurfing",
        }
    }

    /// Arbitration priority; lower wins on equal confidence.
    pub fn type_priority(&self) -> u8 {
        match self.kind {
            CandidateKind::Cycle => 0,
            CandidateKind::Smurfing { .. } => 1,
            CandidateKind::ShellNetwork => 2,
        }
    }

    /// Core account for smurfing candidates.
    pub fn core_account(&self) -> Option<&AccountId> {
        match &self.kind {
            CandidateKind::Smurfing { core } => Some(core),
            _ => None,
        }
    }

    /// Whether the candidate came from cycle detection (cycle rings are
    /// exempt from the 15-member cap).
    pub fn is_cycle(&self) -> bool {
        matches!(self.kind, CandidateKind::Cycle)
    }
}

/// A final, arbitrated fraud ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    /// Dense identifier of the form `RING_001`.
    pub ring_id: String,
    /// Sorted member accounts; disjoint across rings.
    pub member_accounts: Vec<AccountId>,
    /// Pattern type of the winning candidate.
    pub pattern_type: String,
    /// Risk score in [0, 100], one decimal.
    pub risk_score: f64,
}

impl FraudRing {
    /// Format a dense ring id from a 1-based position.
    pub fn format_id(position: usize) -> String {
        format!("RING_{position:03}")
    }
}

/// Round to one decimal place, as every emitted score is.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_priority_order() {
        let cycle = CandidateRing {
            members: vec!["A".into(), "B".into(), "C".into()],
            kind: CandidateKind::Cycle,
            risk_score: 80.0,
            confidence: 0.9,
        };
        let smurf = CandidateRing {
            kind: CandidateKind::Smurfing { core: "H".into() },
            ..cycle.clone()
        };
        let shell = CandidateRing {
            kind: CandidateKind::ShellNetwork,
            ..cycle.clone()
        };
        assert!(cycle.type_priority() < smurf.type_priority());
        assert!(smurf.type_priority() < shell.type_priority());
        assert_eq!(smurf.core_account().map(String::as_str), Some("H"));
    }

    #[test]
    fn test_ring_id_format() {
        assert_eq!(FraudRing::format_id(1), "RING_001");
        assert_eq!(FraudRing::format_id(42), "RING_042");
        assert_eq!(FraudRing::format_id(120), "RING_120");
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(55.04), 55.0);
        assert_eq!(round1(55.06), 55.1);
        assert_eq!(round1(100.0), 100.0);
    }
}
