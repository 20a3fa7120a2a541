use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainResult, ItemId, TransactionId};

use crate::employee::{Employee, require_positive_quantity};
use crate::status::TransactionStatus;

/// A one-way stock draw-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryTransaction {
    pub id: TransactionId,
    pub seq: u64,
    pub employee: Employee,
    pub quantity: i64,
    pub item_id: Option<ItemId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Request: create an inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInquiry {
    pub employee: Employee,
    pub item_id: ItemId,
    pub quantity: i64,
    #[serde(default)]
    pub notes: String,
}

impl NewInquiry {
    pub fn validate(&self) -> DomainResult<()> {
        self.employee.validate()?;
        require_positive_quantity(self.quantity)
    }

    pub fn into_inquiry(
        self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> DomainResult<InquiryTransaction> {
        self.validate()?;
        Ok(InquiryTransaction {
            id,
            seq: 0,
            employee: self.employee,
            quantity: self.quantity,
            item_id: Some(self.item_id),
            completed_at: None,
            status: TransactionStatus::Pending,
            notes: self.notes,
            created_at: now,
            version: 0,
        })
    }
}
