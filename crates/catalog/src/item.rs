use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, ItemId};

/// A stocked item.
///
/// The quantity on hand is private: it only changes through [`Item::adjust`]
/// and [`Item::merge`], both of which refuse to go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    id: ItemId,
    name: String,
    quantity: i64,
    shelf: String,
    category_id: Option<CategoryId>,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Request: create an item (directly, or by completing an insertion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub quantity: i64,
    pub shelf: String,
    pub category_id: CategoryId,
}

impl NewItem {
    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("item name", &self.name)?;
        if self.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(())
    }

    /// Build the item row. The caller checks that `category_id` exists.
    pub fn into_item(self, id: ItemId) -> DomainResult<Item> {
        self.validate()?;
        Ok(Item {
            id,
            name: self.name,
            quantity: self.quantity,
            shelf: self.shelf,
            category_id: Some(self.category_id),
        })
    }
}

/// Request: edit the descriptive fields of an item. Quantity is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub shelf: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl Item {
    /// Rehydrate an item from storage.
    pub fn restore(
        id: ItemId,
        name: String,
        quantity: i64,
        shelf: String,
        category_id: Option<CategoryId>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation(format!(
                "item {id} has negative quantity {quantity}"
            )));
        }
        Ok(Self {
            id,
            name,
            quantity,
            shelf,
            category_id,
        })
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn shelf(&self) -> &str {
        &self.shelf
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    /// Quantity after applying `delta`, without mutating.
    pub fn checked_quantity(&self, delta: i64) -> DomainResult<i64> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(
                self.id.to_string(),
                self.quantity,
                -delta,
            ));
        }
        Ok(next)
    }

    /// Apply a signed stock delta. Never clamps.
    pub fn adjust(&mut self, delta: i64) -> DomainResult<i64> {
        self.quantity = self.checked_quantity(delta)?;
        Ok(self.quantity)
    }

    /// Fold a replenishment into this item: quantities add, shelf and category
    /// are overwritten by the incoming values.
    pub fn merge(&mut self, incoming: &NewItem) -> DomainResult<()> {
        incoming.validate()?;
        if incoming.quantity > 0 {
            self.quantity = self.checked_quantity(incoming.quantity)?;
        }
        self.shelf = incoming.shelf.clone();
        self.category_id = Some(incoming.category_id);
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: ItemPatch) -> DomainResult<()> {
        if let Some(name) = patch.name {
            DomainError::require_text("item name", &name)?;
            self.name = name;
        }
        if let Some(shelf) = patch.shelf {
            self.shelf = shelf;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = Some(category_id);
        }
        Ok(())
    }

    /// Put back shelf/category captured before a merge (compensation path).
    pub fn restore_placement(&mut self, shelf: String, category_id: Option<CategoryId>) {
        self.shelf = shelf;
        self.category_id = category_id;
    }

    /// Drop the category link (category deleted under `set_null`).
    pub fn detach_category(&mut self) {
        self.category_id = None;
    }
}
