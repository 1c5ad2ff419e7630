//! # fraudgraph-engine
//!
//! The forensics pipeline: configuration, staged orchestration, ring
//! consolidation and arbitration, composite scoring with suppression, and
//! the output document.
//!
//! ```ignore
//! use fraudgraph_engine::{EngineConfig, ForensicsEngine};
//!
//! let engine = ForensicsEngine::new(EngineConfig::default())?;
//! let report = engine.analyze(&table)?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod config;
pub mod consolidation;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod hierarchy;
pub mod pipeline;
pub mod report;
pub mod scoring;

pub use config::{AnomalyConfig, ArbitrationConfig, EngineConfig, ScoringConfig};
pub use context::AnalysisContext;
pub use error::{EngineError, EngineResult};
pub use evaluation::DetectionEvaluation;
pub use pipeline::ForensicsEngine;
pub use report::{AnalysisReport, AnalysisSummary, SuspiciousAccount};
