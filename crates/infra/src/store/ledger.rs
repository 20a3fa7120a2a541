use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_catalog::{Item, NewItem};
use stockroom_core::{CategoryId, ItemId};
use stockroom_transactions::StockEffect;

use crate::error::StoreResult;

/// What a ledger call actually changed, with enough detail to undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEffect {
    /// Reverts are keyed by this id, so each effect is undone at most once.
    pub id: Uuid,
    pub item_id: ItemId,
    pub change: AppliedChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedChange {
    Adjusted {
        delta: i64,
    },
    /// A new item row was created.
    Created,
    /// Quantity was added onto an existing item and its placement overwritten.
    Merged {
        added: i64,
        previous_shelf: String,
        previous_category: Option<CategoryId>,
    },
}

impl AppliedEffect {
    pub fn new(item_id: ItemId, change: AppliedChange) -> Self {
        Self {
            id: Uuid::now_v7(),
            item_id,
            change,
        }
    }
}

/// The only component allowed to change quantity on hand.
///
/// Never clamps: a delta that would leave the item below zero fails with
/// `InsufficientStock` and changes nothing.
#[async_trait::async_trait]
pub trait StockLedger: Send + Sync {
    /// Apply a signed delta to an item, re-reading it by id first.
    async fn adjust(&self, item_id: ItemId, delta: i64) -> StoreResult<Item>;

    /// Merge the candidate into the item with the same (exact) name, or create it.
    async fn materialize(&self, request: &NewItem) -> StoreResult<AppliedEffect>;

    /// Undo a previously applied effect.
    async fn revert(&self, effect: &AppliedEffect) -> StoreResult<()>;

    async fn apply(&self, effect: &StockEffect) -> StoreResult<Option<AppliedEffect>> {
        match effect {
            StockEffect::None => Ok(None),
            StockEffect::Adjust { item_id, delta } => {
                self.adjust(*item_id, *delta).await?;
                Ok(Some(AppliedEffect::new(
                    *item_id,
                    AppliedChange::Adjusted { delta: *delta },
                )))
            }
            StockEffect::Materialize(request) => self.materialize(request).await.map(Some),
        }
    }
}
