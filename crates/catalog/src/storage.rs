use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, StorageId};

/// Top level of the catalog: a named place holding categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub id: StorageId,
    pub name: String,
    pub location: String,
}

impl Entity for Storage {
    type Id = StorageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Request: create a storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStorage {
    pub name: String,
    pub location: String,
}

impl NewStorage {
    pub fn into_storage(self, id: StorageId) -> DomainResult<Storage> {
        DomainError::require_text("storage name", &self.name)?;
        Ok(Storage {
            id,
            name: self.name,
            location: self.location,
        })
    }
}

/// Request: change a storage's name and/or location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePatch {
    pub name: Option<String>,
    pub location: Option<String>,
}

impl Storage {
    pub fn apply_patch(&mut self, patch: StoragePatch) -> DomainResult<()> {
        if let Some(name) = patch.name {
            DomainError::require_text("storage name", &name)?;
            self.name = name;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        Ok(())
    }
}
