//! Transition commit for stores without multi-statement transactions.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use stockroom_catalog::{
    Category, Item, ItemPatch, NewCategory, NewItem, NewStorage, Storage, StoragePatch,
};
use stockroom_core::{CategoryId, ExpectedVersion, ItemId, StorageId};
use stockroom_transactions::{
    ExportRecord, StockEffect, Transaction, TransactionKind, TransactionRef,
};

use crate::error::{StoreError, StoreResult};
use crate::query::Pagination;
use crate::store::{
    AppliedEffect, CatalogStore, CategoryDetail, StockLedger, StorageDetail, TransactionLog,
    TransitionCommit, TransitionStore,
};

/// Adapter that commits a transition as: apply stock effect, persist record,
/// and on a persist failure revert the effect.
///
/// Ordering invariant: **the record is only written after the effect succeeded**,
/// so a failed effect never leaves a record claiming stock moved. The remaining gap
/// (persist fails and the revert fails too) is logged at `error` for reconciliation.
pub struct CompensatingStore<S> {
    inner: S,
    reverted: Mutex<RevertMarks>,
}

/// How many reverted effect ids are remembered before the oldest is forgotten.
const REVERT_MARK_CAPACITY: usize = 4096;

/// Effect ids whose revert is running or done, oldest first.
#[derive(Debug, Default)]
struct RevertMarks {
    ids: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl RevertMarks {
    /// Claim `id`; false when it is already claimed.
    fn claim(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > REVERT_MARK_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn release(&mut self, id: Uuid) {
        if self.ids.remove(&id) {
            self.order.retain(|marked| *marked != id);
        }
    }
}

impl<S> CompensatingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reverted: Mutex::new(RevertMarks::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: StockLedger> CompensatingStore<S> {
    /// Undo `effect` unless it was already undone. Returns whether it ran now.
    #[instrument(skip(self, effect), fields(effect_id = %effect.id, item_id = %effect.item_id), err)]
    pub async fn revert_once(&self, effect: &AppliedEffect) -> StoreResult<bool> {
        let claimed = self
            .reverted
            .lock()
            .map_err(|_| StoreError::poisoned())?
            .claim(effect.id);
        if !claimed {
            return Ok(false);
        }

        if let Err(err) = self.inner.revert(effect).await {
            // A failed revert may be retried.
            self.reverted
                .lock()
                .map_err(|_| StoreError::poisoned())?
                .release(effect.id);
            return Err(err);
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl<S> TransitionStore for CompensatingStore<S>
where
    S: StockLedger + TransactionLog,
{
    async fn commit(&self, commit: TransitionCommit) -> StoreResult<Transaction> {
        let TransitionCommit {
            mut next,
            expected,
            effect,
        } = commit;
        let reference = next.reference();

        // 1) Stock effect (fails cleanly on insufficient stock / missing item)
        let applied = self.inner.apply(&effect).await?;

        if let (StockEffect::Materialize(_), Some(applied)) = (&effect, &applied) {
            next.set_item(Some(applied.item_id));
        }

        // 2) Persist the record; undo the effect if that fails
        match self.inner.update(&next, expected).await {
            Ok(stored) => Ok(stored),
            Err(persist_err) => {
                if let Some(applied) = applied {
                    match self.revert_once(&applied).await {
                        Ok(_) => warn!(
                            transaction = %reference,
                            effect_id = %applied.id,
                            error = %persist_err,
                            "stock effect reverted after failed record update"
                        ),
                        Err(revert_err) => error!(
                            transaction = %reference,
                            effect_id = %applied.id,
                            item_id = %applied.item_id,
                            error = %persist_err,
                            revert_error = %revert_err,
                            "stock effect could not be reverted; manual reconciliation required"
                        ),
                    }
                }
                Err(persist_err)
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: StockLedger> StockLedger for CompensatingStore<S> {
    async fn adjust(&self, item_id: ItemId, delta: i64) -> StoreResult<Item> {
        self.inner.adjust(item_id, delta).await
    }

    async fn materialize(&self, request: &NewItem) -> StoreResult<AppliedEffect> {
        self.inner.materialize(request).await
    }

    async fn revert(&self, effect: &AppliedEffect) -> StoreResult<()> {
        self.revert_once(effect).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl<S: TransactionLog> TransactionLog for CompensatingStore<S> {
    async fn insert(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.inner.insert(transaction).await
    }

    async fn get(&self, reference: TransactionRef) -> StoreResult<Option<Transaction>> {
        self.inner.get(reference).await
    }

    async fn get_by_seq(&self, kind: TransactionKind, seq: u64) -> StoreResult<Option<Transaction>> {
        self.inner.get_by_seq(kind, seq).await
    }

    async fn list(&self, kind: TransactionKind, page: Pagination) -> StoreResult<Vec<Transaction>> {
        self.inner.list(kind, page).await
    }

    async fn update(
        &self,
        transaction: &Transaction,
        expected: ExpectedVersion,
    ) -> StoreResult<Transaction> {
        self.inner.update(transaction, expected).await
    }

    async fn delete(&self, reference: TransactionRef) -> StoreResult<bool> {
        self.inner.delete(reference).await
    }

    async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ExportRecord>> {
        self.inner.export(from, to).await
    }
}

#[async_trait::async_trait]
impl<S: CatalogStore> CatalogStore for CompensatingStore<S> {
    async fn create_storage(&self, request: NewStorage) -> StoreResult<Storage> {
        self.inner.create_storage(request).await
    }

    async fn get_storage(&self, id: StorageId) -> StoreResult<Option<StorageDetail>> {
        self.inner.get_storage(id).await
    }

    async fn list_storages(&self) -> StoreResult<Vec<Storage>> {
        self.inner.list_storages().await
    }

    async fn update_storage(&self, id: StorageId, patch: StoragePatch) -> StoreResult<Storage> {
        self.inner.update_storage(id, patch).await
    }

    async fn delete_storage(&self, id: StorageId) -> StoreResult<()> {
        self.inner.delete_storage(id).await
    }

    async fn create_category(&self, request: NewCategory) -> StoreResult<Category> {
        self.inner.create_category(request).await
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        self.inner.get_category(id).await
    }

    async fn list_categories(&self, page: Pagination) -> StoreResult<Vec<Category>> {
        self.inner.list_categories(page).await
    }

    async fn get_category_with_items(
        &self,
        id: CategoryId,
    ) -> StoreResult<Option<CategoryDetail>> {
        self.inner.get_category_with_items(id).await
    }

    async fn rename_category(&self, id: CategoryId, name: String) -> StoreResult<Category> {
        self.inner.rename_category(id, name).await
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        self.inner.delete_category(id).await
    }

    async fn create_item(&self, request: NewItem) -> StoreResult<Item> {
        self.inner.create_item(request).await
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        self.inner.get_item(id).await
    }

    async fn get_item_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        self.inner.get_item_by_name(name).await
    }

    async fn list_items(&self, page: Pagination) -> StoreResult<Vec<Item>> {
        self.inner.list_items(page).await
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> StoreResult<Item> {
        self.inner.update_item(id, patch).await
    }

    async fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        self.inner.delete_item(id).await
    }
}
