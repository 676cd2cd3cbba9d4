//! Domain error taxonomy.
//!
//! Every variant is recoverable: batch operations skip the affected
//! asset and keep going. Nothing here aborts an evaluation run.

use thiserror::Error;

/// Result alias for domain operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Per-asset estimation and pricing failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// History shorter than the required window.
    #[error("insufficient data: need at least {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// All-positive or all-negative return set, or a zero denominator.
    #[error("degenerate distribution: {reason}")]
    DegenerateDistribution { reason: String },

    /// Non-positive time, volatility, spot or strike.
    #[error("invalid option inputs: {reason}")]
    InvalidOptionInputs { reason: String },

    /// Multi-asset covariance matrix is not invertible.
    #[error("singular covariance matrix ({dimension}x{dimension})")]
    SingularCovariance { dimension: usize },
}

impl EngineError {
    /// Create an insufficient data error.
    pub fn insufficient_data(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }

    /// Create a degenerate distribution error.
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateDistribution {
            reason: reason.into(),
        }
    }

    /// Create an invalid option inputs error.
    pub fn invalid_option(reason: impl Into<String>) -> Self {
        Self::InvalidOptionInputs {
            reason: reason.into(),
        }
    }
}
