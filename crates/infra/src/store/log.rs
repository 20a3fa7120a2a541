use chrono::{DateTime, Utc};

use stockroom_core::ExpectedVersion;
use stockroom_transactions::{ExportRecord, Transaction, TransactionKind, TransactionRef};

use crate::error::StoreResult;
use crate::query::Pagination;

/// Durable storage of transaction records, one collection per kind.
#[async_trait::async_trait]
pub trait TransactionLog: Send + Sync {
    /// Store a new record. Assigns `seq` and the initial version.
    async fn insert(&self, transaction: Transaction) -> StoreResult<Transaction>;

    async fn get(&self, reference: TransactionRef) -> StoreResult<Option<Transaction>>;

    /// Look up by the per-kind sequence number.
    async fn get_by_seq(&self, kind: TransactionKind, seq: u64) -> StoreResult<Option<Transaction>>;

    /// Insertion order.
    async fn list(&self, kind: TransactionKind, page: Pagination) -> StoreResult<Vec<Transaction>>;

    /// Overwrite the mutable fields of a stored record and bump its version.
    ///
    /// Fails with `Conflict` when the stored version does not match `expected`.
    async fn update(
        &self,
        transaction: &Transaction,
        expected: ExpectedVersion,
    ) -> StoreResult<Transaction>;

    /// Hard delete. Returns whether a record was removed.
    async fn delete(&self, reference: TransactionRef) -> StoreResult<bool>;

    /// All kinds created within `[from, to]`, loans then inquiries then insertions.
    async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ExportRecord>>;
}
