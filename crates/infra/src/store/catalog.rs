use serde::Serialize;

use stockroom_catalog::{
    Category, CategorySummary, Item, ItemPatch, NewCategory, NewItem, NewStorage, Storage,
    StoragePatch,
};
use stockroom_core::{CategoryId, ItemId, StorageId};

use crate::error::StoreResult;
use crate::query::Pagination;

/// A storage with the id/name of each category it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageDetail {
    #[serde(flatten)]
    pub storage: Storage,
    pub categories: Vec<CategorySummary>,
}

/// A category with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub items: Vec<Item>,
}

/// CRUD over the storage -> category -> item hierarchy.
///
/// Creating a child whose parent is missing fails with `ParentNotFound`. Deletes follow
/// the store's configured `CatalogPolicy`; deleting an item empties the item link of
/// every transaction that referenced it.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_storage(&self, request: NewStorage) -> StoreResult<Storage>;

    async fn get_storage(&self, id: StorageId) -> StoreResult<Option<StorageDetail>>;

    async fn list_storages(&self) -> StoreResult<Vec<Storage>>;

    async fn update_storage(&self, id: StorageId, patch: StoragePatch) -> StoreResult<Storage>;

    async fn delete_storage(&self, id: StorageId) -> StoreResult<()>;

    async fn create_category(&self, request: NewCategory) -> StoreResult<Category>;

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    async fn list_categories(&self, page: Pagination) -> StoreResult<Vec<Category>>;

    async fn get_category_with_items(
        &self,
        id: CategoryId,
    ) -> StoreResult<Option<CategoryDetail>>;

    async fn rename_category(&self, id: CategoryId, name: String) -> StoreResult<Category>;

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    async fn create_item(&self, request: NewItem) -> StoreResult<Item>;

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// Case-sensitive exact match.
    async fn get_item_by_name(&self, name: &str) -> StoreResult<Option<Item>>;

    async fn list_items(&self, page: Pagination) -> StoreResult<Vec<Item>>;

    /// Edit name/shelf/category. Quantity only moves through the ledger.
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> StoreResult<Item>;

    async fn delete_item(&self, id: ItemId) -> StoreResult<()>;

    async fn rename_item(&self, id: ItemId, name: String) -> StoreResult<Item> {
        self.update_item(
            id,
            ItemPatch {
                name: Some(name),
                ..ItemPatch::default()
            },
        )
        .await
    }
}
