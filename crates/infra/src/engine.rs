//! Transaction engine (application-level orchestration).
//!
//! ```text
//! request
//!   ↓
//! 1. Validate input, check referenced catalog rows exist
//!   ↓
//! 2. Lock the transaction (per kind + id)
//!   ↓
//! 3. Re-read the record and compute the transition (pure, no IO)
//!   ↓
//! 4. Commit stock effect + record together (TransitionStore)
//! ```
//!
//! The engine contains no IO itself; it composes the store traits.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{Span, info, instrument};

use stockroom_core::{DomainError, ExpectedVersion, ItemId, TransactionId};
use stockroom_transactions::{
    ExportRecord, NewInquiry, NewInsertion, NewLoan, Transaction, TransactionKind,
    TransactionRef, TransactionStatus, TransactionView,
};

use crate::error::StoreError;
use crate::locks::TransactionLocks;
use crate::query::{DEFAULT_PAGE_SIZE, Pagination};
use crate::store::{CatalogStore, TransactionLog, TransitionCommit, TransitionStore};

/// Error returned by every engine operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("parent not found: {0}")]
    ParentNotFound(String),
    #[error("insufficient stock for item {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },
    #[error("illegal transition from '{from}' to '{to}'")]
    IllegalTransition { from: String, to: String },
    #[error("invalid transaction kind: {0}")]
    InvalidTransactionKind(String),
    /// Stale version or concurrent write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The store failed for reasons unrelated to the request.
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::ParentNotFound(what) => EngineError::ParentNotFound(what),
            DomainError::InsufficientStock {
                item,
                available,
                requested,
            } => EngineError::InsufficientStock {
                item,
                available,
                requested,
            },
            DomainError::IllegalTransition { from, to } => {
                EngineError::IllegalTransition { from, to }
            }
            DomainError::InvalidTransactionKind(kind) => EngineError::InvalidTransactionKind(kind),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(err) => err.into(),
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            StoreError::Constraint(msg) => EngineError::Validation(msg),
            other => EngineError::Store(other),
        }
    }
}

/// Creates transactions and drives them through their lifecycle.
///
/// ## Guarantees
///
/// - Stock is only moved through `TransitionStore::commit`, together with the record.
/// - Transitions on the same transaction are serialized in-process; the versioned
///   update rejects stale writes from other processes.
/// - Transitions on different transactions run in parallel.
/// - Nothing is retried; every failure reaches the caller.
pub struct TransactionEngine<S> {
    store: S,
    locks: TransactionLocks,
    default_page_size: u32,
}

impl<S> TransactionEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: TransactionLocks::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    /// Catalog/log access for callers that manage storages, categories and items.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> TransactionEngine<S>
where
    S: CatalogStore + TransactionLog + TransitionStore,
{
    #[instrument(skip(self, request), fields(kind = "loan", item_id = %request.item_id, transaction_id), err)]
    pub async fn create_loan(&self, request: NewLoan) -> Result<Transaction, EngineError> {
        request.validate()?;
        self.require_item(request.item_id).await?;
        let loan = request.into_loan(TransactionId::new(), Utc::now())?;
        self.insert(loan.into()).await
    }

    #[instrument(skip(self, request), fields(kind = "inquiry", item_id = %request.item_id, transaction_id), err)]
    pub async fn create_inquiry(&self, request: NewInquiry) -> Result<Transaction, EngineError> {
        request.validate()?;
        self.require_item(request.item_id).await?;
        let inquiry = request.into_inquiry(TransactionId::new(), Utc::now())?;
        self.insert(inquiry.into()).await
    }

    #[instrument(
        skip(self, request),
        fields(kind = "insertion", candidate = %request.item_request.name, transaction_id),
        err
    )]
    pub async fn create_insertion(
        &self,
        request: NewInsertion,
    ) -> Result<Transaction, EngineError> {
        request.validate()?;
        let category_id = request.item_request.category_id;
        if self.store.get_category(category_id).await?.is_none() {
            return Err(EngineError::NotFound(format!("category {category_id}")));
        }
        let insertion = request.into_insertion(TransactionId::new(), Utc::now())?;
        self.insert(insertion.into()).await
    }

    pub async fn get(&self, reference: TransactionRef) -> Result<Transaction, EngineError> {
        self.store
            .get(reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(reference.to_string()))
    }

    /// Look up by flat external identifier (`loan_<uuid>`).
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Transaction, EngineError> {
        let reference: TransactionRef = identifier.parse()?;
        self.get(reference).await
    }

    pub async fn get_by_seq(
        &self,
        kind: TransactionKind,
        seq: u64,
    ) -> Result<Transaction, EngineError> {
        self.store
            .get_by_seq(kind, seq)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("{kind} #{seq}")))
    }

    /// Move a transaction to `target`, committing its stock effect atomically.
    #[instrument(
        skip(self),
        fields(kind = %reference.kind, transaction_id = %reference.id, target = %target, from),
        err
    )]
    pub async fn transition(
        &self,
        reference: TransactionRef,
        target: TransactionStatus,
    ) -> Result<Transaction, EngineError> {
        let _guard = self.locks.acquire(reference).await?;
        let current = self.get(reference).await?;
        self.commit_locked(current, target).await
    }

    /// Boundary form: flat identifier and a raw status string.
    ///
    /// Unknown prefixes are `InvalidTransactionKind`; unknown statuses are
    /// `IllegalTransition` out of the current status.
    #[instrument(skip(self), fields(from), err)]
    pub async fn apply_status(
        &self,
        identifier: &str,
        status: &str,
    ) -> Result<Transaction, EngineError> {
        let reference: TransactionRef = identifier.parse()?;
        let _guard = self.locks.acquire(reference).await?;
        let current = self.get(reference).await?;
        let target = TransactionStatus::parse_target(status, current.status())?;
        self.commit_locked(current, target).await
    }

    /// Hard delete, independent of status.
    #[instrument(skip(self), fields(kind = %reference.kind, transaction_id = %reference.id), err)]
    pub async fn delete(&self, reference: TransactionRef) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(reference).await?;
        if self.store.delete(reference).await? {
            info!("transaction deleted");
            Ok(())
        } else {
            Err(EngineError::NotFound(reference.to_string()))
        }
    }

    pub async fn delete_by_identifier(&self, identifier: &str) -> Result<(), EngineError> {
        let reference: TransactionRef = identifier.parse()?;
        self.delete(reference).await
    }

    /// One page of each kind, concatenated: loans, inquiries, insertions.
    #[instrument(skip(self), err)]
    pub async fn list(&self, page: i64, limit: i64) -> Result<Vec<TransactionView>, EngineError> {
        let window = Pagination::page(page, limit, self.default_page_size);
        let mut views = Vec::new();
        for kind in TransactionKind::ALL {
            let rows = self.store.list(kind, window).await?;
            views.extend(rows.into_iter().map(TransactionView::from));
        }
        Ok(views)
    }

    /// Flat report of every transaction created within `[from, to]`.
    #[instrument(skip(self), fields(rows), err)]
    pub async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRecord>, EngineError> {
        if from > to {
            return Err(EngineError::Validation(
                "export window ends before it starts".to_string(),
            ));
        }
        let rows = self.store.export(from, to).await?;
        Span::current().record("rows", rows.len());
        Ok(rows)
    }

    async fn commit_locked(
        &self,
        current: Transaction,
        target: TransactionStatus,
    ) -> Result<Transaction, EngineError> {
        let span = Span::current();
        span.record("from", current.status().as_str());

        let transition = current.transition(target, Utc::now())?;
        let committed = self
            .store
            .commit(TransitionCommit {
                next: transition.next,
                expected: ExpectedVersion::of(&current),
                effect: transition.effect,
            })
            .await?;

        info!(
            kind = %committed.kind(),
            transaction_id = %committed.id_typed(),
            from = %transition.from,
            to = %committed.status(),
            "transaction transitioned"
        );
        Ok(committed)
    }

    async fn require_item(&self, item_id: ItemId) -> Result<(), EngineError> {
        match self.store.get_item(item_id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(format!("item {item_id}"))),
        }
    }

    async fn insert(&self, transaction: Transaction) -> Result<Transaction, EngineError> {
        let stored = self.store.insert(transaction).await?;
        Span::current().record("transaction_id", tracing::field::display(stored.id_typed()));
        info!(
            kind = %stored.kind(),
            transaction_id = %stored.id_typed(),
            seq = stored.seq(),
            "transaction created"
        );
        Ok(stored)
    }
}
