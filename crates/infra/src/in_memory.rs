//! In-memory catalog, ledger and transaction log.
//!
//! Intended for tests/dev. Not optimized for performance: collections are plain
//! vectors kept in insertion order and scanned linearly. Every call takes the single
//! state lock once, so each individual call is atomic.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use stockroom_catalog::{
    CatalogPolicy, Category, CategorySummary, DeletePolicy, Item, ItemPatch, NewCategory, NewItem,
    NewStorage, Storage, StoragePatch,
};
use stockroom_core::{
    CategoryId, DomainError, Entity, ExpectedVersion, ItemId, StorageId, Versioned,
};
use stockroom_transactions::{
    ExportJoin, ExportRecord, Transaction, TransactionKind, TransactionRef, view,
};

use crate::error::{StoreError, StoreResult};
use crate::query::Pagination;
use crate::store::{
    AppliedChange, AppliedEffect, CatalogStore, CategoryDetail, StockLedger, StorageDetail,
    TransactionLog, encode_image,
};

/// Row with the given identifier, scanning in insertion order.
fn find<'a, E: Entity>(rows: &'a [E], id: &E::Id) -> Option<&'a E> {
    rows.iter().find(|row| row.id() == id)
}

#[derive(Debug, Default)]
struct KindLog {
    last_seq: u64,
    rows: Vec<Transaction>,
}

#[derive(Debug, Default)]
struct State {
    storages: Vec<Storage>,
    categories: Vec<Category>,
    items: Vec<Item>,
    loans: KindLog,
    inquiries: KindLog,
    insertions: KindLog,
}

impl State {
    fn log(&self, kind: TransactionKind) -> &KindLog {
        match kind {
            TransactionKind::Loan => &self.loans,
            TransactionKind::Inquiry => &self.inquiries,
            TransactionKind::Insertion => &self.insertions,
        }
    }

    fn log_mut(&mut self, kind: TransactionKind) -> &mut KindLog {
        match kind {
            TransactionKind::Loan => &mut self.loans,
            TransactionKind::Inquiry => &mut self.inquiries,
            TransactionKind::Insertion => &mut self.insertions,
        }
    }

    fn storage_exists(&self, id: StorageId) -> bool {
        find(&self.storages, &id).is_some()
    }

    fn category_exists(&self, id: CategoryId) -> bool {
        find(&self.categories, &id).is_some()
    }

    fn item(&self, id: ItemId) -> Option<&Item> {
        find(&self.items, &id)
    }

    fn item_mut(&mut self, id: ItemId) -> StoreResult<&mut Item> {
        self.items
            .iter_mut()
            .find(|i| i.id_typed() == id)
            .ok_or_else(|| StoreError::not_found(format!("item {id}")))
    }

    fn require_category(&self, id: CategoryId) -> StoreResult<()> {
        if self.category_exists(id) {
            Ok(())
        } else {
            Err(DomainError::parent_not_found(format!("category {id}")).into())
        }
    }

    /// Remove an item and empty the item link of every transaction pointing at it.
    /// Detached rows get a new version so transitions read before the delete conflict.
    fn remove_item(&mut self, id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id_typed() != id);
        if self.items.len() == before {
            return false;
        }
        for kind in TransactionKind::ALL {
            for row in self.log_mut(kind).rows.iter_mut() {
                if row.item_id() == Some(id) {
                    row.set_item(None);
                    let version = row.version();
                    row.set_version(version + 1);
                }
            }
        }
        true
    }

    fn remove_category(&mut self, id: CategoryId, items: DeletePolicy) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.id != id);
        if self.categories.len() == before {
            return false;
        }
        match items {
            DeletePolicy::Cascade => {
                let doomed: Vec<ItemId> = self
                    .items
                    .iter()
                    .filter(|i| i.category_id() == Some(id))
                    .map(Item::id_typed)
                    .collect();
                for item_id in doomed {
                    self.remove_item(item_id);
                }
            }
            DeletePolicy::SetNull => {
                for item in self.items.iter_mut().filter(|i| i.category_id() == Some(id)) {
                    item.detach_category();
                }
            }
        }
        true
    }

    fn export_join(&self, transaction: &Transaction) -> ExportJoin {
        let item = transaction.item_id().and_then(|id| self.item(id));
        let category_name = item
            .and_then(Item::category_id)
            .and_then(|cid| find(&self.categories, &cid))
            .map(|c| c.name.clone());
        let image = match transaction {
            Transaction::Insertion(t) => t.image.as_deref().map(encode_image),
            _ => None,
        };
        ExportJoin {
            item_name: item.map(|i| i.name().to_string()),
            category_name,
            image,
        }
    }
}

/// Catalog + ledger + transaction log held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    policy: CatalogPolicy,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CatalogPolicy) -> Self {
        Self {
            state: RwLock::default(),
            policy,
        }
    }

    pub fn policy(&self) -> CatalogPolicy {
        self.policy
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::poisoned())
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_storage(&self, request: NewStorage) -> StoreResult<Storage> {
        let storage = request.into_storage(StorageId::new())?;
        self.write()?.storages.push(storage.clone());
        Ok(storage)
    }

    async fn get_storage(&self, id: StorageId) -> StoreResult<Option<StorageDetail>> {
        let state = self.read()?;
        Ok(find(&state.storages, &id).map(|storage| {
            let categories = state
                .categories
                .iter()
                .filter(|c| c.storage_id == Some(id))
                .map(CategorySummary::from)
                .collect();
            StorageDetail {
                storage: storage.clone(),
                categories,
            }
        }))
    }

    async fn list_storages(&self) -> StoreResult<Vec<Storage>> {
        Ok(self.read()?.storages.clone())
    }

    async fn update_storage(&self, id: StorageId, patch: StoragePatch) -> StoreResult<Storage> {
        let mut state = self.write()?;
        let storage = state
            .storages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found(format!("storage {id}")))?;
        storage.apply_patch(patch)?;
        Ok(storage.clone())
    }

    async fn delete_storage(&self, id: StorageId) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.storage_exists(id) {
            return Err(StoreError::not_found(format!("storage {id}")));
        }
        match self.policy.storage_categories {
            DeletePolicy::Cascade => {
                let doomed: Vec<CategoryId> = state
                    .categories
                    .iter()
                    .filter(|c| c.storage_id == Some(id))
                    .map(|c| c.id)
                    .collect();
                for category_id in doomed {
                    state.remove_category(category_id, self.policy.category_items);
                }
            }
            DeletePolicy::SetNull => {
                for category in state.categories.iter_mut().filter(|c| c.storage_id == Some(id)) {
                    category.storage_id = None;
                }
            }
        }
        state.storages.retain(|s| s.id != id);
        Ok(())
    }

    async fn create_category(&self, request: NewCategory) -> StoreResult<Category> {
        let mut state = self.write()?;
        if !state.storage_exists(request.storage_id) {
            return Err(
                DomainError::parent_not_found(format!("storage {}", request.storage_id)).into(),
            );
        }
        let category = request.into_category(CategoryId::new())?;
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(find(&self.read()?.categories, &id).cloned())
    }

    async fn list_categories(&self, page: Pagination) -> StoreResult<Vec<Category>> {
        Ok(page.slice(&self.read()?.categories))
    }

    async fn get_category_with_items(
        &self,
        id: CategoryId,
    ) -> StoreResult<Option<CategoryDetail>> {
        let state = self.read()?;
        Ok(state
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|category| CategoryDetail {
                category: category.clone(),
                items: state
                    .items
                    .iter()
                    .filter(|i| i.category_id() == Some(id))
                    .cloned()
                    .collect(),
            }))
    }

    async fn rename_category(&self, id: CategoryId, name: String) -> StoreResult<Category> {
        let mut state = self.write()?;
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found(format!("category {id}")))?;
        category.rename(name)?;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.remove_category(id, self.policy.category_items) {
            Ok(())
        } else {
            Err(StoreError::not_found(format!("category {id}")))
        }
    }

    async fn create_item(&self, request: NewItem) -> StoreResult<Item> {
        let mut state = self.write()?;
        state.require_category(request.category_id)?;
        let item = request.into_item(ItemId::new())?;
        state.items.push(item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.read()?.item(id).cloned())
    }

    async fn get_item_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        Ok(self.read()?.items.iter().find(|i| i.name() == name).cloned())
    }

    async fn list_items(&self, page: Pagination) -> StoreResult<Vec<Item>> {
        Ok(page.slice(&self.read()?.items))
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> StoreResult<Item> {
        let mut state = self.write()?;
        if let Some(category_id) = patch.category_id {
            state.require_category(category_id)?;
        }
        let item = state.item_mut(id)?;
        item.apply_patch(patch)?;
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        if self.write()?.remove_item(id) {
            Ok(())
        } else {
            Err(StoreError::not_found(format!("item {id}")))
        }
    }
}

#[async_trait::async_trait]
impl StockLedger for InMemoryStore {
    async fn adjust(&self, item_id: ItemId, delta: i64) -> StoreResult<Item> {
        let mut state = self.write()?;
        let item = state.item_mut(item_id)?;
        item.adjust(delta)?;
        Ok(item.clone())
    }

    async fn materialize(&self, request: &NewItem) -> StoreResult<AppliedEffect> {
        request.validate()?;
        let mut state = self.write()?;
        state.require_category(request.category_id)?;

        if let Some(existing) = state.items.iter_mut().find(|i| i.name() == request.name) {
            let previous_shelf = existing.shelf().to_string();
            let previous_category = existing.category_id();
            existing.merge(request)?;
            return Ok(AppliedEffect::new(
                existing.id_typed(),
                AppliedChange::Merged {
                    added: request.quantity,
                    previous_shelf,
                    previous_category,
                },
            ));
        }

        let item = request.clone().into_item(ItemId::new())?;
        let item_id = item.id_typed();
        state.items.push(item);
        Ok(AppliedEffect::new(item_id, AppliedChange::Created))
    }

    async fn revert(&self, effect: &AppliedEffect) -> StoreResult<()> {
        let mut state = self.write()?;
        match &effect.change {
            AppliedChange::Adjusted { delta } => {
                state.item_mut(effect.item_id)?.adjust(-delta)?;
            }
            AppliedChange::Created => {
                if !state.remove_item(effect.item_id) {
                    return Err(StoreError::not_found(format!("item {}", effect.item_id)));
                }
            }
            AppliedChange::Merged {
                added,
                previous_shelf,
                previous_category,
            } => {
                let item = state.item_mut(effect.item_id)?;
                if *added != 0 {
                    item.adjust(-added)?;
                }
                item.restore_placement(previous_shelf.clone(), *previous_category);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionLog for InMemoryStore {
    async fn insert(&self, mut transaction: Transaction) -> StoreResult<Transaction> {
        let mut state = self.write()?;
        let log = state.log_mut(transaction.kind());
        if log.rows.iter().any(|r| r.id_typed() == transaction.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "{} already exists",
                transaction.reference()
            )));
        }
        log.last_seq += 1;
        transaction.set_seq(log.last_seq);
        transaction.set_version(1);
        log.rows.push(transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, reference: TransactionRef) -> StoreResult<Option<Transaction>> {
        Ok(find(&self.read()?.log(reference.kind).rows, &reference.id).cloned())
    }

    async fn get_by_seq(&self, kind: TransactionKind, seq: u64) -> StoreResult<Option<Transaction>> {
        Ok(self
            .read()?
            .log(kind)
            .rows
            .iter()
            .find(|r| r.seq() == seq)
            .cloned())
    }

    async fn list(&self, kind: TransactionKind, page: Pagination) -> StoreResult<Vec<Transaction>> {
        Ok(page.slice(&self.read()?.log(kind).rows))
    }

    async fn update(
        &self,
        transaction: &Transaction,
        expected: ExpectedVersion,
    ) -> StoreResult<Transaction> {
        let reference = transaction.reference();
        let mut state = self.write()?;
        let row = state
            .log_mut(reference.kind)
            .rows
            .iter_mut()
            .find(|r| r.id_typed() == reference.id)
            .ok_or_else(|| StoreError::not_found(reference.to_string()))?;

        let current = row.version();
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "{reference}: expected {expected:?}, found {current}"
            )));
        }

        let mut stored = transaction.clone();
        stored.set_seq(row.seq());
        stored.set_version(current + 1);
        *row = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, reference: TransactionRef) -> StoreResult<bool> {
        let mut state = self.write()?;
        let rows = &mut state.log_mut(reference.kind).rows;
        let before = rows.len();
        rows.retain(|r| r.id_typed() != reference.id);
        Ok(rows.len() != before)
    }

    async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ExportRecord>> {
        let state = self.read()?;
        let mut records = Vec::new();
        for kind in TransactionKind::ALL {
            for row in &state.log(kind).rows {
                if view::within(row.created_at(), from, to) {
                    records.push(ExportRecord::new(row, state.export_join(row)));
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_transactions::{Employee, NewInquiry, NewInsertion, TransactionStatus};
    use stockroom_core::TransactionId;

    fn employee() -> Employee {
        Employee {
            name: "Sari".to_string(),
            department: "HR".to_string(),
            position: "Lead".to_string(),
        }
    }

    async fn seeded(store: &InMemoryStore) -> (StorageId, CategoryId, Item) {
        let storage = store
            .create_storage(NewStorage {
                name: "ATK".to_string(),
                location: "TSO Manyar".to_string(),
            })
            .await
            .unwrap();
        let category = store
            .create_category(NewCategory {
                name: "Office".to_string(),
                storage_id: storage.id,
                image: None,
            })
            .await
            .unwrap();
        let item = store
            .create_item(NewItem {
                name: "Stapler".to_string(),
                quantity: 10,
                shelf: "A1".to_string(),
                category_id: category.id,
            })
            .await
            .unwrap();
        (storage.id, category.id, item)
    }

    async fn inquiry_for(store: &InMemoryStore, item_id: ItemId) -> Transaction {
        let tx = NewInquiry {
            employee: employee(),
            item_id,
            quantity: 1,
            notes: String::new(),
        }
        .into_inquiry(TransactionId::new(), Utc::now())
        .unwrap();
        store.insert(tx.into()).await.unwrap()
    }

    #[tokio::test]
    async fn children_require_existing_parents() {
        let store = InMemoryStore::new();
        let err = store
            .create_category(NewCategory {
                name: "Orphan".to_string(),
                storage_id: StorageId::new(),
                image: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::ParentNotFound(_))));

        let err = store
            .create_item(NewItem {
                name: "Orphan".to_string(),
                quantity: 1,
                shelf: "Z9".to_string(),
                category_id: CategoryId::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::ParentNotFound(_))));
    }

    #[tokio::test]
    async fn adjust_never_goes_below_zero() {
        let store = InMemoryStore::new();
        let (_, _, item) = seeded(&store).await;

        let err = store.adjust(item.id_typed(), -11).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InsufficientStock { available: 10, requested: 11, .. })
        ));
        assert_eq!(store.adjust(item.id_typed(), -10).await.unwrap().quantity(), 0);
        assert!(matches!(
            store.adjust(ItemId::new(), 1).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn materialize_merges_by_exact_name_and_reverts() {
        let store = InMemoryStore::new();
        let (_, category_id, item) = seeded(&store).await;
        let other_category = store
            .create_category(NewCategory {
                name: "Spare".to_string(),
                storage_id: store.list_storages().await.unwrap()[0].id,
                image: None,
            })
            .await
            .unwrap();

        let merged = store
            .materialize(&NewItem {
                name: "Stapler".to_string(),
                quantity: 5,
                shelf: "B2".to_string(),
                category_id: other_category.id,
            })
            .await
            .unwrap();
        assert_eq!(merged.item_id, item.id_typed());
        let after = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(after.quantity(), 15);
        assert_eq!(after.shelf(), "B2");

        store.revert(&merged).await.unwrap();
        let restored = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(restored.quantity(), 10);
        assert_eq!(restored.shelf(), "A1");
        assert_eq!(restored.category_id(), Some(category_id));

        // Different case is a different item.
        let created = store
            .materialize(&NewItem {
                name: "stapler".to_string(),
                quantity: 2,
                shelf: "B2".to_string(),
                category_id,
            })
            .await
            .unwrap();
        assert_eq!(created.change, AppliedChange::Created);
        assert_ne!(created.item_id, item.id_typed());
    }

    #[tokio::test]
    async fn update_checks_expected_version() {
        let store = InMemoryStore::new();
        let (_, _, item) = seeded(&store).await;
        let stored = inquiry_for(&store, item.id_typed()).await;
        assert_eq!(stored.seq(), 1);
        assert_eq!(stored.version(), 1);

        let next = stored
            .transition(TransactionStatus::Approved, Utc::now())
            .unwrap()
            .next;
        let updated = store.update(&next, ExpectedVersion::of(&stored)).await.unwrap();
        assert_eq!(updated.version(), 2);

        let err = store.update(&next, ExpectedVersion::of(&stored)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let by_seq = store.get_by_seq(TransactionKind::Inquiry, 1).await.unwrap().unwrap();
        assert_eq!(by_seq.status(), TransactionStatus::Approved);
    }

    #[tokio::test]
    async fn deleting_an_item_empties_transaction_links() {
        let store = InMemoryStore::new();
        let (_, _, item) = seeded(&store).await;
        let tx = inquiry_for(&store, item.id_typed()).await;

        store.delete_item(item.id_typed()).await.unwrap();

        let reloaded = store.get(tx.reference()).await.unwrap().unwrap();
        assert_eq!(reloaded.item_id(), None);
    }

    #[tokio::test]
    async fn transition_read_before_item_delete_conflicts() {
        let store = InMemoryStore::new();
        let (_, _, item) = seeded(&store).await;
        let stored = inquiry_for(&store, item.id_typed()).await;
        let next = stored
            .transition(TransactionStatus::Approved, Utc::now())
            .unwrap()
            .next;

        store.delete_item(item.id_typed()).await.unwrap();

        let err = store.update(&next, ExpectedVersion::of(&stored)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let reloaded = store.get(stored.reference()).await.unwrap().unwrap();
        assert_eq!(reloaded.item_id(), None);
        assert_eq!(reloaded.status(), TransactionStatus::Pending);
        assert_eq!(reloaded.version(), stored.version() + 1);
    }

    #[tokio::test]
    async fn update_storage_patches_given_fields() {
        let store = InMemoryStore::new();
        let (storage_id, _, _) = seeded(&store).await;

        let updated = store
            .update_storage(
                storage_id,
                StoragePatch {
                    name: None,
                    location: Some("TSO Gubeng".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "ATK");
        assert_eq!(updated.location, "TSO Gubeng");

        let err = store
            .update_storage(
                storage_id,
                StoragePatch {
                    name: Some("  ".to_string()),
                    location: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert!(matches!(
            store.update_storage(StorageId::new(), StoragePatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_storage_summarizes_its_categories() {
        let store = InMemoryStore::new();
        let (storage_id, category_id, _) = seeded(&store).await;
        let second = store
            .create_category(NewCategory {
                name: "Cleaning".to_string(),
                storage_id,
                image: None,
            })
            .await
            .unwrap();

        let detail = store.get_storage(storage_id).await.unwrap().unwrap();
        assert_eq!(detail.storage.name, "ATK");
        let summaries: Vec<(CategoryId, &str)> = detail
            .categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();
        assert_eq!(summaries, vec![(category_id, "Office"), (second.id, "Cleaning")]);
        assert!(store.get_storage(StorageId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_category_rejects_blank_names() {
        let store = InMemoryStore::new();
        let (_, category_id, _) = seeded(&store).await;

        let renamed = store
            .rename_category(category_id, "Office Supplies".to_string())
            .await
            .unwrap();
        assert_eq!(renamed.name, "Office Supplies");

        let err = store
            .rename_category(category_id, "   ".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        let kept = store.get_category(category_id).await.unwrap().unwrap();
        assert_eq!(kept.name, "Office Supplies");

        assert!(matches!(
            store.rename_category(CategoryId::new(), "Ghost".to_string()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_category_with_items_lists_members_only() {
        let store = InMemoryStore::new();
        let (storage_id, category_id, item) = seeded(&store).await;
        let other = store
            .create_category(NewCategory {
                name: "Pantry".to_string(),
                storage_id,
                image: None,
            })
            .await
            .unwrap();
        store
            .create_item(NewItem {
                name: "Coffee".to_string(),
                quantity: 4,
                shelf: "K1".to_string(),
                category_id: other.id,
            })
            .await
            .unwrap();

        let detail = store.get_category_with_items(category_id).await.unwrap().unwrap();
        assert_eq!(detail.category.name, "Office");
        let ids: Vec<ItemId> = detail.items.iter().map(Item::id_typed).collect();
        assert_eq!(ids, vec![item.id_typed()]);
        assert!(store
            .get_category_with_items(CategoryId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_item_requires_existing_category() {
        let store = InMemoryStore::new();
        let (storage_id, _, item) = seeded(&store).await;
        let target = store
            .create_category(NewCategory {
                name: "Archive".to_string(),
                storage_id,
                image: None,
            })
            .await
            .unwrap();

        let moved = store
            .update_item(
                item.id_typed(),
                ItemPatch {
                    shelf: Some("Z2".to_string()),
                    category_id: Some(target.id),
                    ..ItemPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.shelf(), "Z2");
        assert_eq!(moved.category_id(), Some(target.id));
        assert_eq!(moved.quantity(), 10);

        let err = store
            .update_item(
                item.id_typed(),
                ItemPatch {
                    category_id: Some(CategoryId::new()),
                    ..ItemPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::ParentNotFound(_))));
        let unchanged = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(unchanged.category_id(), Some(target.id));
    }

    #[tokio::test]
    async fn list_items_pages_in_insertion_order() {
        let store = InMemoryStore::new();
        let (_, category_id, stapler) = seeded(&store).await;
        for (name, shelf) in [("Paper Clip", "A2"), ("Tape", "A3")] {
            store
                .create_item(NewItem {
                    name: name.to_string(),
                    quantity: 1,
                    shelf: shelf.to_string(),
                    category_id,
                })
                .await
                .unwrap();
        }

        let first = store.list_items(Pagination::page(1, 2, 10)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id_typed(), stapler.id_typed());
        let second = store.list_items(Pagination::page(2, 2, 10)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name(), "Tape");
    }

    #[tokio::test]
    async fn list_categories_pages_in_insertion_order() {
        let store = InMemoryStore::new();
        let (storage_id, _, _) = seeded(&store).await;
        for name in ["Pantry", "Cleaning"] {
            store
                .create_category(NewCategory {
                    name: name.to_string(),
                    storage_id,
                    image: None,
                })
                .await
                .unwrap();
        }

        let all = store.list_categories(Pagination::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Office", "Pantry", "Cleaning"]);
        let last = store.list_categories(Pagination::page(3, 1, 10)).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].name, "Cleaning");
        assert!(store
            .list_categories(Pagination::page(4, 1, 10))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn storage_delete_follows_policy() {
        // Default: storage cascades to categories, categories null out items.
        let store = InMemoryStore::new();
        let (storage_id, category_id, item) = seeded(&store).await;
        store.delete_storage(storage_id).await.unwrap();
        assert!(store.get_category(category_id).await.unwrap().is_none());
        let orphan = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(orphan.category_id(), None);

        let store = InMemoryStore::with_policy(CatalogPolicy {
            storage_categories: DeletePolicy::SetNull,
            category_items: DeletePolicy::Cascade,
        });
        let (storage_id, category_id, item) = seeded(&store).await;
        store.delete_storage(storage_id).await.unwrap();
        let kept = store.get_category(category_id).await.unwrap().unwrap();
        assert_eq!(kept.storage_id, None);
        store.delete_category(category_id).await.unwrap();
        assert!(store.get_item(item.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn export_joins_names_and_encodes_images() {
        let store = InMemoryStore::new();
        let (_, category_id, item) = seeded(&store).await;
        let start = Utc::now();
        inquiry_for(&store, item.id_typed()).await;
        let insertion = NewInsertion {
            employee: employee(),
            item_request: NewItem {
                name: "Glue".to_string(),
                quantity: 3,
                shelf: "C1".to_string(),
                category_id,
            },
            image: Some(vec![0xde, 0xad, 0xbe, 0xef]),
            notes: String::new(),
        }
        .into_insertion(TransactionId::new(), Utc::now())
        .unwrap();
        store.insert(insertion.into()).await.unwrap();
        let end = Utc::now();

        let rows = store.export(start, end).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, "InquiryTransaction");
        assert_eq!(rows[0].item_name.as_deref(), Some("Stapler"));
        assert_eq!(rows[0].category_name.as_deref(), Some("Office"));
        assert_eq!(rows[1].kind, "InsertionTransaction");
        assert_eq!(rows[1].image.as_deref(), Some("3q2+7w=="));
        assert!(rows[1].item_name.is_none());

        assert!(store.export(end + chrono::Duration::seconds(1), end + chrono::Duration::seconds(2))
            .await
            .unwrap()
            .is_empty());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig {
            cases: 256,
            ..proptest::prelude::ProptestConfig::default()
        })]

        /// Property: whatever the order of deltas, stock never drops below zero and the
        /// final quantity equals the start plus every accepted delta.
        #[test]
        fn ledger_never_goes_negative(
            start in 0i64..50,
            deltas in proptest::collection::vec(-20i64..20, 1..40),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                let (_, _, item) = seeded(&store).await;
                let id = item.id_typed();
                // Seeded at 10; move to `start`.
                if start != 10 {
                    store.adjust(id, start - 10).await.unwrap();
                }

                let mut expected = start;
                for delta in deltas.into_iter().filter(|d| *d != 0) {
                    match store.adjust(id, delta).await {
                        Ok(updated) => {
                            expected += delta;
                            assert_eq!(updated.quantity(), expected);
                        }
                        Err(StoreError::Domain(DomainError::InsufficientStock { available, .. })) => {
                            assert!(expected + delta < 0);
                            assert_eq!(available, expected);
                        }
                        Err(other) => panic!("unexpected error: {other:?}"),
                    }
                    assert!(store.get_item(id).await.unwrap().unwrap().quantity() >= 0);
                }
                assert_eq!(store.get_item(id).await.unwrap().unwrap().quantity(), expected);
            });
        }
    }
}
