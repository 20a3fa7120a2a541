use stockroom_core::ExpectedVersion;
use stockroom_transactions::{StockEffect, Transaction};

use crate::error::StoreResult;

/// One transition to persist: the stock effect and the updated record, together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub next: Transaction,
    /// Version of the record the transition was computed from.
    pub expected: ExpectedVersion,
    pub effect: StockEffect,
}

/// Commit a transition so that stock and record never disagree once it returns.
///
/// On success returns the stored record (new version; an insertion is linked to the
/// item it materialized). On failure neither the stock nor the record has changed,
/// except where a compensation failure was logged for reconciliation.
#[async_trait::async_trait]
pub trait TransitionStore: Send + Sync {
    async fn commit(&self, commit: TransitionCommit) -> StoreResult<Transaction>;
}
