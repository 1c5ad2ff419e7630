//! # fraudgraph-core
//!
//! Core domain types for the fraudgraph forensics engine:
//! - Transaction records and the tabular ingest boundary
//! - The directed transaction multigraph with deterministic iteration
//! - Pattern labels and the per-account label bitset
//! - Candidate / final fraud-ring models
//! - Dataset-level adaptive statistics
//! - Disjoint-set used by ring merging

pub mod error;
pub mod graph;
pub mod models;
pub mod stats;
pub mod union_find;

pub use error::{CoreError, CoreResult};
pub use graph::TransactionGraph;
pub use models::*;
pub use stats::{coefficient_of_variation, median, AdaptiveStats};
pub use union_find::UnionFind;
