use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ItemId, TransactionId};

use crate::employee::{Employee, require_positive_quantity};
use crate::status::TransactionStatus;

/// A temporary stock withdrawal, expected to come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransaction {
    pub id: TransactionId,
    /// Store-assigned position within the loan collection (0 until stored).
    pub seq: u64,
    pub employee: Employee,
    pub quantity: i64,
    /// Empty once the item was deleted.
    pub item_id: Option<ItemId>,
    pub loan_time: DateTime<Utc>,
    /// Expected return.
    pub return_time: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Request: create a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub employee: Employee,
    pub item_id: ItemId,
    pub quantity: i64,
    pub loan_time: DateTime<Utc>,
    pub return_time: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl NewLoan {
    pub fn validate(&self) -> DomainResult<()> {
        self.employee.validate()?;
        require_positive_quantity(self.quantity)?;
        if self.return_time < self.loan_time {
            return Err(DomainError::validation(
                "return time cannot be before loan time",
            ));
        }
        Ok(())
    }

    /// Build a `pending` loan. The caller checks that the item exists.
    pub fn into_loan(self, id: TransactionId, now: DateTime<Utc>) -> DomainResult<LoanTransaction> {
        self.validate()?;
        Ok(LoanTransaction {
            id,
            seq: 0,
            employee: self.employee,
            quantity: self.quantity,
            item_id: Some(self.item_id),
            loan_time: self.loan_time,
            return_time: self.return_time,
            returned_at: None,
            completed_at: None,
            status: TransactionStatus::Pending,
            notes: self.notes,
            created_at: now,
            version: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::test_employee;
    use chrono::Duration;

    fn request() -> NewLoan {
        let now = Utc::now();
        NewLoan {
            employee: test_employee(),
            item_id: ItemId::new(),
            quantity: 2,
            loan_time: now,
            return_time: now + Duration::days(3),
            notes: String::new(),
        }
    }

    #[test]
    fn new_loan_starts_pending() {
        let loan = request().into_loan(TransactionId::new(), Utc::now()).unwrap();
        assert_eq!(loan.status, TransactionStatus::Pending);
        assert!(loan.completed_at.is_none());
        assert!(loan.returned_at.is_none());
    }

    #[test]
    fn return_before_loan_is_rejected() {
        let mut req = request();
        req.return_time = req.loan_time - Duration::hours(1);
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut req = request();
        req.quantity = 0;
        assert!(req.into_loan(TransactionId::new(), Utc::now()).is_err());
    }
}
