//! # fraudgraph-detect
//!
//! Stage-1/2 detectors of the forensics pipeline:
//! - Business immunity (payroll, merchant)
//! - Cycle detection with multi-constraint validation
//! - Shell-network chains
//! - Velocity, low-variance, and commercial-hub signals
//! - Smurfing windows with soft scoring
//! - Structuring windows
//!
//! Every detector is a pure function of the read-only graph, the adaptive
//! statistics, and (where membership is filtered) the immunity map; outputs
//! are candidate rings plus per-account label sets.

pub mod cycles;
pub mod immunity;
pub mod shells;
pub mod smurfing;
pub mod structuring;
pub mod velocity;

pub use cycles::{detect_cycles, CycleConfig, CycleDetection};
pub use immunity::{detect_immunity, ImmunityConfig, ImmunityKind, ImmunityMap};
pub use shells::{detect_shells, ShellConfig, ShellDetection};
pub use smurfing::{detect_smurfing, SmurfConfig, SmurfDetection};
pub use structuring::{detect_structuring, StructuringConfig};
pub use velocity::{detect_velocity, VelocityConfig, VelocitySignals};

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{Duration, TimeZone, Utc};
    use fraudgraph_core::{AdaptiveStats, Dataset, Transaction, TransactionGraph};

    /// Transaction at `hour` hours past a fixed origin.
    pub fn tx_at(sender: &str, receiver: &str, amount: f64, hour: u32) -> Transaction {
        tx_at_min(sender, receiver, amount, hour, 0)
    }

    /// Transaction at `hour` hours + `minute` minutes past the origin.
    pub fn tx_at_min(
        sender: &str,
        receiver: &str,
        amount: f64,
        hour: u32,
        minute: u32,
    ) -> Transaction {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Transaction {
            id: format!("{sender}-{receiver}-{hour}-{minute}"),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: origin + Duration::hours(hour as i64) + Duration::minutes(minute as i64),
        }
    }

    pub fn graph_of(transactions: Vec<Transaction>) -> TransactionGraph {
        TransactionGraph::from_dataset(Dataset::from_transactions(transactions))
    }

    pub fn stats_of(graph: &TransactionGraph) -> AdaptiveStats {
        AdaptiveStats::compute(graph)
    }
}
