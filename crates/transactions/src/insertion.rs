use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::NewItem;
use stockroom_core::{DomainError, DomainResult, ItemId, TransactionId};

use crate::employee::{Employee, require_positive_quantity};
use crate::status::TransactionStatus;

/// A proposal to add stock, possibly for an item that does not exist yet.
///
/// `item_id` stays empty until completion materializes the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionTransaction {
    pub id: TransactionId,
    pub seq: u64,
    pub employee: Employee,
    pub item_request: NewItem,
    pub item_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Request: propose an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInsertion {
    pub employee: Employee,
    pub item_request: NewItem,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub notes: String,
}

impl NewInsertion {
    pub fn validate(&self) -> DomainResult<()> {
        self.employee.validate()?;
        self.item_request.validate()?;
        DomainError::require_text("shelf", &self.item_request.shelf)?;
        require_positive_quantity(self.item_request.quantity)
    }

    /// Build a `pending` insertion. The caller checks that the candidate's category exists.
    pub fn into_insertion(
        self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> DomainResult<InsertionTransaction> {
        self.validate()?;
        Ok(InsertionTransaction {
            id,
            seq: 0,
            employee: self.employee,
            item_request: self.item_request,
            item_id: None,
            image: self.image,
            completed_at: None,
            status: TransactionStatus::Pending,
            notes: self.notes,
            created_at: now,
            version: 0,
        })
    }
}
