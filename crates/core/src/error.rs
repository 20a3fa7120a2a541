//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, illegal state changes). Storage failures belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity (item, category, storage, transaction) does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A child was created against a parent that does not exist.
    #[error("parent not found: {0}")]
    ParentNotFound(String),

    /// Applying a stock delta would take the quantity on hand below zero.
    #[error("insufficient stock for item {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// The requested status change is not allowed from the current status
    /// (or the target status is not recognized at all).
    #[error("illegal transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },

    /// An external identifier carried an unknown kind prefix.
    #[error("invalid transaction kind: {0}")]
    InvalidTransactionKind(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn parent_not_found(msg: impl Into<String>) -> Self {
        Self::ParentNotFound(msg.into())
    }

    pub fn insufficient_stock(item: impl Into<String>, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            item: item.into(),
            available,
            requested,
        }
    }

    pub fn illegal_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IllegalTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn invalid_kind(msg: impl Into<String>) -> Self {
        Self::InvalidTransactionKind(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Reject blank (empty or whitespace-only) text fields.
    pub fn require_text(field: &str, value: &str) -> DomainResult<()> {
        if value.trim().is_empty() {
            return Err(Self::validation(format!("{field} cannot be empty")));
        }
        Ok(())
    }
}
