use sqlx::PgConnection;
use tracing::instrument;

use stockroom_catalog::{Item, NewItem};
use stockroom_core::{DomainError, ItemId};

use super::rows::{self, ITEM_COLUMNS};
use super::{PostgresStore, map_sqlx_error};
use crate::error::{StoreError, StoreResult};
use crate::store::{AppliedChange, AppliedEffect, StockLedger};

/// Lock the item row and return it.
async fn lock_item(conn: &mut PgConnection, item_id: ItemId) -> StoreResult<Item> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
    ))
    .bind(item_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("lock_item", e))?;

    match row {
        Some(row) => rows::item(&row),
        None => Err(StoreError::not_found(format!("item {item_id}"))),
    }
}

/// Apply `delta` inside the caller's transaction.
pub(super) async fn adjust_in(
    conn: &mut PgConnection,
    item_id: ItemId,
    delta: i64,
) -> StoreResult<Item> {
    let current = lock_item(conn, item_id).await?;
    // Reports InsufficientStock with the quantity we just locked.
    current.checked_quantity(delta)?;

    let row = sqlx::query(&format!(
        "UPDATE items SET quantity = quantity + $2 \
         WHERE id = $1 AND quantity + $2 >= 0 \
         RETURNING {ITEM_COLUMNS}"
    ))
    .bind(item_id.as_uuid())
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("adjust_item", e))?;

    match row {
        Some(row) => rows::item(&row),
        None => Err(DomainError::insufficient_stock(
            item_id.to_string(),
            current.quantity(),
            -delta,
        )
        .into()),
    }
}

/// Merge-or-create inside the caller's transaction.
pub(super) async fn materialize_in(
    conn: &mut PgConnection,
    request: &NewItem,
) -> StoreResult<AppliedEffect> {
    request.validate()?;

    // Row locks cannot cover a name with no row yet; serialize on the name itself.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&request.name)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("lock_item_name", e))?;

    let existing = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE name = $1 \
         ORDER BY created_at, id LIMIT 1 FOR UPDATE"
    ))
    .bind(&request.name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("find_item_by_name", e))?;

    if let Some(row) = existing {
        let mut item = rows::item(&row)?;
        let previous_shelf = item.shelf().to_string();
        let previous_category = item.category_id();
        item.merge(request)?;

        sqlx::query("UPDATE items SET quantity = $2, shelf = $3, category_id = $4 WHERE id = $1")
            .bind(item.id_typed().as_uuid())
            .bind(item.quantity())
            .bind(item.shelf())
            .bind(request.category_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("merge_item", e))?;

        return Ok(AppliedEffect::new(
            item.id_typed(),
            AppliedChange::Merged {
                added: request.quantity,
                previous_shelf,
                previous_category,
            },
        ));
    }

    let item = request.clone().into_item(ItemId::new())?;
    sqlx::query(
        "INSERT INTO items (id, name, quantity, shelf, category_id) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(item.id_typed().as_uuid())
    .bind(item.name())
    .bind(item.quantity())
    .bind(item.shelf())
    .bind(request.category_id.as_uuid())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_item", e))?;

    Ok(AppliedEffect::new(item.id_typed(), AppliedChange::Created))
}

/// Undo inside the caller's transaction.
pub(super) async fn revert_in(conn: &mut PgConnection, effect: &AppliedEffect) -> StoreResult<()> {
    match &effect.change {
        AppliedChange::Adjusted { delta } => {
            adjust_in(conn, effect.item_id, -delta).await?;
        }
        AppliedChange::Created => {
            let done = sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(effect.item_id.as_uuid())
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("revert_create", e))?;
            if done.rows_affected() == 0 {
                return Err(StoreError::not_found(format!("item {}", effect.item_id)));
            }
        }
        AppliedChange::Merged {
            added,
            previous_shelf,
            previous_category,
        } => {
            if *added != 0 {
                adjust_in(conn, effect.item_id, -added).await?;
            }
            sqlx::query("UPDATE items SET shelf = $2, category_id = $3 WHERE id = $1")
                .bind(effect.item_id.as_uuid())
                .bind(previous_shelf)
                .bind(previous_category.map(|c| *c.as_uuid()))
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("revert_merge", e))?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl StockLedger for PostgresStore {
    #[instrument(skip(self), fields(item_id = %item_id, delta), err)]
    async fn adjust(&self, item_id: ItemId, delta: i64) -> StoreResult<Item> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let item = adjust_in(&mut tx, item_id, delta).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn materialize(&self, request: &NewItem) -> StoreResult<AppliedEffect> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let applied = materialize_in(&mut tx, request).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(applied)
    }

    #[instrument(skip(self, effect), fields(effect_id = %effect.id, item_id = %effect.item_id), err)]
    async fn revert(&self, effect: &AppliedEffect) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        revert_in(&mut tx, effect).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}
