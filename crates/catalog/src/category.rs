use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, StorageId};

/// A named group of items inside a storage.
///
/// `storage_id` is empty only after the owning storage was deleted under the
/// `set_null` policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub storage_id: Option<StorageId>,
    pub image: Option<Vec<u8>>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Id + name only; what a storage lists for its categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
}

impl From<&Category> for CategorySummary {
    fn from(value: &Category) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}

/// Request: create a category under an existing storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub storage_id: StorageId,
    pub image: Option<Vec<u8>>,
}

impl NewCategory {
    /// Build the category row. The caller checks that `storage_id` exists.
    pub fn into_category(self, id: CategoryId) -> DomainResult<Category> {
        DomainError::require_text("category name", &self.name)?;
        Ok(Category {
            id,
            name: self.name,
            storage_id: Some(self.storage_id),
            image: self.image,
        })
    }
}

impl Category {
    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<String> {
        let name = name.into();
        DomainError::require_text("category name", &name)?;
        Ok(std::mem::replace(&mut self.name, name))
    }
}
