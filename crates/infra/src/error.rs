//! Infrastructure error taxonomy.

use thiserror::Error;

use stockroom_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a store implementation.
///
/// Business-rule failures detected while storing (insufficient stock, missing parent,
/// blank names) travel as [`StoreError::Domain`] so callers see the same taxonomy
/// whichever backend produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A row the operation needs is missing.
    #[error("{0} not found")]
    NotFound(String),

    /// Optimistic concurrency failure (stale version, duplicate key).
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// Integrity constraint other than foreign-key/check (e.g. not-null).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("connection pool closed in {0}")]
    PoolClosed(String),

    /// Lock poisoning, IO, protocol or decoding failures.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub(crate) fn poisoned() -> Self {
        Self::Backend("lock poisoned".to_string())
    }
}
