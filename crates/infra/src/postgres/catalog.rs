use sqlx::PgConnection;
use tracing::instrument;

use stockroom_catalog::{
    Category, DeletePolicy, Item, ItemPatch, NewCategory, NewItem, NewStorage, Storage,
    StoragePatch,
};
use stockroom_core::{CategoryId, ItemId, StorageId};

use super::rows::{self, CATEGORY_COLUMNS, ITEM_COLUMNS, STORAGE_COLUMNS};
use super::{PostgresStore, map_sqlx_error};
use crate::error::{StoreError, StoreResult};
use crate::query::Pagination;
use crate::store::{CatalogStore, CategoryDetail, StorageDetail};

/// Apply the category -> items policy for every category matched by `scope`.
async fn release_items(
    conn: &mut PgConnection,
    policy: DeletePolicy,
    scope: &str,
    parent: uuid::Uuid,
) -> StoreResult<()> {
    let sql = match policy {
        DeletePolicy::Cascade => format!("DELETE FROM items WHERE category_id IN ({scope})"),
        DeletePolicy::SetNull => {
            format!("UPDATE items SET category_id = NULL WHERE category_id IN ({scope})")
        }
    };
    sqlx::query(&sql)
        .bind(parent)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("release_items", e))?;
    Ok(())
}

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_storage(&self, request: NewStorage) -> StoreResult<Storage> {
        let storage = request.into_storage(StorageId::new())?;
        sqlx::query("INSERT INTO storages (id, name, location) VALUES ($1, $2, $3)")
            .bind(storage.id.as_uuid())
            .bind(&storage.name)
            .bind(&storage.location)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_storage", e))?;
        Ok(storage)
    }

    async fn get_storage(&self, id: StorageId) -> StoreResult<Option<StorageDetail>> {
        let row = sqlx::query(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_storage", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let storage = rows::storage(&row)?;

        let category_rows = sqlx::query(
            "SELECT id, name FROM categories WHERE storage_id = $1 ORDER BY created_at, id",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("storage_categories", e))?;

        let categories = category_rows
            .iter()
            .map(rows::category_summary)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(StorageDetail {
            storage,
            categories,
        }))
    }

    async fn list_storages(&self) -> StoreResult<Vec<Storage>> {
        let found = sqlx::query(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages ORDER BY created_at, id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_storages", e))?;
        found.iter().map(rows::storage).collect()
    }

    #[instrument(skip(self, patch), fields(storage_id = %id), err)]
    async fn update_storage(&self, id: StorageId, patch: StoragePatch) -> StoreResult<Storage> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_storage", e))?
        .ok_or_else(|| StoreError::not_found(format!("storage {id}")))?;

        let mut storage = rows::storage(&row)?;
        storage.apply_patch(patch)?;

        sqlx::query("UPDATE storages SET name = $2, location = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(&storage.name)
            .bind(&storage.location)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_storage", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(storage)
    }

    #[instrument(skip(self), fields(storage_id = %id, policy = %self.policy.storage_categories), err)]
    async fn delete_storage(&self, id: StorageId) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match self.policy.storage_categories {
            DeletePolicy::Cascade => {
                release_items(
                    &mut tx,
                    self.policy.category_items,
                    "SELECT id FROM categories WHERE storage_id = $1",
                    *id.as_uuid(),
                )
                .await?;
                sqlx::query("DELETE FROM categories WHERE storage_id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("delete_categories", e))?;
            }
            DeletePolicy::SetNull => {
                sqlx::query("UPDATE categories SET storage_id = NULL WHERE storage_id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("detach_categories", e))?;
            }
        }

        let done = sqlx::query("DELETE FROM storages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_storage", e))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("storage {id}")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(name = %request.name, storage_id = %request.storage_id), err)]
    async fn create_category(&self, request: NewCategory) -> StoreResult<Category> {
        let category = request.into_category(CategoryId::new())?;
        sqlx::query("INSERT INTO categories (id, name, storage_id, image) VALUES ($1, $2, $3, $4)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.storage_id.map(|s| *s.as_uuid()))
            .bind(category.image.as_deref())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_category", e))?;
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(rows::category).transpose()
    }

    async fn list_categories(&self, page: Pagination) -> StoreResult<Vec<Category>> {
        let found = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        found.iter().map(rows::category).collect()
    }

    async fn get_category_with_items(
        &self,
        id: CategoryId,
    ) -> StoreResult<Option<CategoryDetail>> {
        let Some(category) = self.get_category(id).await? else {
            return Ok(None);
        };
        let item_rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE category_id = $1 ORDER BY created_at, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("category_items", e))?;
        let items = item_rows
            .iter()
            .map(rows::item)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(CategoryDetail { category, items }))
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn rename_category(&self, id: CategoryId, name: String) -> StoreResult<Category> {
        let mut category = self
            .get_category(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("category {id}")))?;
        category.rename(name)?;

        let done = sqlx::query("UPDATE categories SET name = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(&category.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_category", e))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("category {id}")));
        }
        Ok(category)
    }

    #[instrument(skip(self), fields(category_id = %id, policy = %self.policy.category_items), err)]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        release_items(&mut tx, self.policy.category_items, "$1", *id.as_uuid()).await?;

        let done = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("category {id}")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(name = %request.name, category_id = %request.category_id), err)]
    async fn create_item(&self, request: NewItem) -> StoreResult<Item> {
        let item = request.into_item(ItemId::new())?;
        sqlx::query(
            "INSERT INTO items (id, name, quantity, shelf, category_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id_typed().as_uuid())
        .bind(item.name())
        .bind(item.quantity())
        .bind(item.shelf())
        .bind(item.category_id().map(|c| *c.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(rows::item).transpose()
    }

    async fn get_item_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE name = $1 ORDER BY created_at, id LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item_by_name", e))?;
        row.as_ref().map(rows::item).transpose()
    }

    async fn list_items(&self, page: Pagination) -> StoreResult<Vec<Item>> {
        let found = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;
        found.iter().map(rows::item).collect()
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> StoreResult<Item> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_item", e))?
        .ok_or_else(|| StoreError::not_found(format!("item {id}")))?;

        let mut item = rows::item(&row)?;
        item.apply_patch(patch)?;

        // Unknown category surfaces as a foreign-key violation (ParentNotFound).
        sqlx::query("UPDATE items SET name = $2, shelf = $3, category_id = $4 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(item.name())
            .bind(item.shelf())
            .bind(item.category_id().map(|c| *c.as_uuid()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        // Transaction rows keep their history; `ON DELETE SET NULL` empties their link.
        let done = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("item {id}")));
        }
        Ok(())
    }
}
