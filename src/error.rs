//! Error types for policy evaluation and comparison.
//!
//! Three failure classes:
//! - invalid input supplied by the caller (arguments, configuration, model data)
//! - a computed distribution breaking its own invariants (a defect, never masked)
//! - a model or policy referring to a state or action outside its declared domain
//!
//! Every computation is deterministic, so none of these is retryable.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Distribution invariant violated: {detail} (total mass {total_mass}, epsilon {epsilon})")]
    DistributionInvariantViolation {
        detail: String,
        total_mass: f64,
        epsilon: f64,
    },

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),
}

impl RiskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unresolved(message: impl Into<String>) -> Self {
        Self::UnresolvedReference(message.into())
    }

    /// True for errors caused by what the caller passed in, as opposed to an
    /// internal defect.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::UnresolvedReference(_)
        )
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, RiskError>;
