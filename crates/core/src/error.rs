//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of the generated data
/// itself (validation, invariants). Infrastructure concerns belong to the
/// processor's sink errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Generated metadata failed validation (e.g. missing field,
    /// non-positive amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A cross-event invariant was violated (e.g. item amounts not
    /// summing to the batch total).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
