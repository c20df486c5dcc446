//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// capacity, state transitions, conflicts). Storage concerns belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed date, inverted range, zero quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough free assets for the requested quantity and dates.
    ///
    /// This is an expected outcome (the user changes quantity or dates), not a
    /// system failure.
    #[error("insufficient capacity for product {product_id}: requested {requested}, available {available}")]
    InsufficientCapacity {
        product_id: String,
        requested: u32,
        available: u32,
    },

    /// A status transition that the state machine does not allow.
    #[error("invalid transition: cannot {action} {entity} in status '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting user may not perform the operation.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn capacity(product_id: impl core::fmt::Display, requested: u32, available: u32) -> Self {
        Self::InsufficientCapacity {
            product_id: product_id.to_string(),
            requested,
            available,
        }
    }

    pub fn transition(
        entity: &'static str,
        from: impl core::fmt::Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }

    /// Capacity errors are routine outcomes and must not be reported as failures.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::InsufficientCapacity { .. })
    }
}
