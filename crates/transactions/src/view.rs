//! Read-side projections: the unified listing row and the flat export row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::ItemId;

use crate::kind::TransactionRef;
use crate::status::TransactionStatus;
use crate::transaction::Transaction;

/// One row of the cross-kind listing: the record plus its flat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub identifier: TransactionRef,
    #[serde(flatten)]
    pub transaction: Transaction,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> Self {
        Self {
            identifier: transaction.reference(),
            transaction,
        }
    }
}

/// Catalog names joined onto an export row (absent when the link is gone).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportJoin {
    pub item_name: Option<String>,
    pub category_name: Option<String>,
    /// Insertion image, already encoded as text.
    pub image: Option<String>,
}

/// Flat, kind-agnostic reporting row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// `LoanTransaction`, `InquiryTransaction` or `InsertionTransaction`.
    pub kind: String,
    pub identifier: TransactionRef,
    pub seq: u64,
    pub employee_name: String,
    pub employee_department: String,
    pub employee_position: String,
    pub category_name: Option<String>,
    pub item_name: Option<String>,
    pub quantity: i64,
    pub status: TransactionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub item_id: Option<ItemId>,
    pub loan_time: Option<DateTime<Utc>>,
    pub return_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

impl ExportRecord {
    pub fn new(transaction: &Transaction, join: ExportJoin) -> Self {
        let employee = transaction.employee();
        let (loan_time, return_time, returned_at) = match transaction {
            Transaction::Loan(l) => (Some(l.loan_time), Some(l.return_time), l.returned_at),
            _ => (None, None, None),
        };
        let image = match transaction {
            Transaction::Insertion(_) => join.image,
            _ => None,
        };

        Self {
            kind: transaction.kind().export_tag().to_string(),
            identifier: transaction.reference(),
            seq: transaction.seq(),
            employee_name: employee.name.clone(),
            employee_department: employee.department.clone(),
            employee_position: employee.position.clone(),
            category_name: join.category_name,
            item_name: join.item_name,
            quantity: transaction.quantity(),
            status: transaction.status(),
            notes: transaction.notes().to_string(),
            created_at: transaction.created_at(),
            item_id: transaction.item_id(),
            loan_time,
            return_time,
            completed_at: transaction.completed_at(),
            returned_at,
            image,
        }
    }
}

/// Inclusive creation-time window used by export.
pub fn within(created_at: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    from <= created_at && created_at <= to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::test_employee;
    use crate::{NewInsertion, NewLoan};
    use chrono::Duration;
    use stockroom_catalog::NewItem;
    use stockroom_core::{CategoryId, TransactionId};

    #[test]
    fn listing_row_carries_flat_identifier() {
        let now = Utc::now();
        let tx: Transaction = NewLoan {
            employee: test_employee(),
            item_id: ItemId::new(),
            quantity: 1,
            loan_time: now,
            return_time: now,
            notes: String::new(),
        }
        .into_loan(TransactionId::new(), now)
        .unwrap()
        .into();

        let view = TransactionView::from(tx.clone());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["identifier"], tx.reference().to_string());
        assert_eq!(json["kind"], "loan");
    }

    #[test]
    fn insertion_export_uses_requested_quantity_and_image() {
        let tx: Transaction = NewInsertion {
            employee: test_employee(),
            item_request: NewItem {
                name: "Glue".to_string(),
                quantity: 12,
                shelf: "B1".to_string(),
                category_id: CategoryId::new(),
            },
            image: Some(vec![0xde, 0xad]),
            notes: "restock".to_string(),
        }
        .into_insertion(TransactionId::new(), Utc::now())
        .unwrap()
        .into();

        let row = ExportRecord::new(
            &tx,
            ExportJoin {
                image: Some("3q0=".to_string()),
                ..ExportJoin::default()
            },
        );
        assert_eq!(row.kind, "InsertionTransaction");
        assert_eq!(row.quantity, 12);
        assert_eq!(row.image.as_deref(), Some("3q0="));
        assert!(row.loan_time.is_none());
        assert!(row.item_name.is_none());
    }

    #[test]
    fn window_is_inclusive() {
        let t = Utc::now();
        assert!(within(t, t, t));
        assert!(!within(t, t + Duration::seconds(1), t + Duration::seconds(2)));
    }
}
