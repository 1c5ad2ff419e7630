//! Error types for the forensics core.

use thiserror::Error;

/// Errors raised while preparing an analysis.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The input table is missing required columns. Analysis does not start.
    #[error("Missing required columns: {}", missing.join(", "))]
    Schema {
        /// Names of the absent columns, in required-column order.
        missing: Vec<String>,
    },

    /// A structurally invalid parameter was supplied.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CoreError {
    /// Create a schema error from the missing column names.
    pub fn schema(missing: Vec<String>) -> Self {
        Self::Schema { missing }
    }

    /// Create an invalid-parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
