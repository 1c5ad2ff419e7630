//! Domain models: transactions, pattern labels, rings.

pub mod patterns;
pub mod rings;
pub mod transaction;

pub use patterns::{PatternLabel, PatternSet, LABELS_BY_NAME};
pub use rings::{round1, CandidateKind, CandidateRing, FraudRing};
pub use transaction::{parse_timestamp, AccountId, Dataset, RawTable, Transaction, REQUIRED_COLUMNS};
