//! Engine-level errors.

use thiserror::Error;

use fraudgraph_core::CoreError;

/// Errors surfaced by the analysis pipeline. Only schema problems abort an
/// analysis; coercion failures drop rows and budget exhaustion truncates
/// detection silently.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Ingest-level failure (missing columns).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The engine configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
