use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::NewItem;
use stockroom_core::{DomainError, DomainResult, Entity, ItemId, TransactionId, Versioned};

use crate::employee::Employee;
use crate::inquiry::InquiryTransaction;
use crate::insertion::InsertionTransaction;
use crate::kind::{TransactionKind, TransactionRef};
use crate::lifecycle::{self, StockMove};
use crate::loan::LoanTransaction;
use crate::status::TransactionStatus;

/// Any stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Transaction {
    Loan(LoanTransaction),
    Inquiry(InquiryTransaction),
    Insertion(InsertionTransaction),
}

/// Stock change that must be committed together with a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Signed delta on an existing item.
    Adjust { item_id: ItemId, delta: i64 },
    /// Merge into the item with the same name, or create it.
    Materialize(NewItem),
}

impl StockEffect {
    pub fn is_none(&self) -> bool {
        matches!(self, StockEffect::None)
    }
}

/// Outcome of a legal transition: the record to persist and the stock effect to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: TransactionStatus,
    pub next: Transaction,
    pub effect: StockEffect,
}

impl From<LoanTransaction> for Transaction {
    fn from(value: LoanTransaction) -> Self {
        Transaction::Loan(value)
    }
}

impl From<InquiryTransaction> for Transaction {
    fn from(value: InquiryTransaction) -> Self {
        Transaction::Inquiry(value)
    }
}

impl From<InsertionTransaction> for Transaction {
    fn from(value: InsertionTransaction) -> Self {
        Transaction::Insertion(value)
    }
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Loan(_) => TransactionKind::Loan,
            Transaction::Inquiry(_) => TransactionKind::Inquiry,
            Transaction::Insertion(_) => TransactionKind::Insertion,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        match self {
            Transaction::Loan(t) => t.id,
            Transaction::Inquiry(t) => t.id,
            Transaction::Insertion(t) => t.id,
        }
    }

    pub fn reference(&self) -> TransactionRef {
        TransactionRef::new(self.kind(), self.id_typed())
    }

    pub fn seq(&self) -> u64 {
        match self {
            Transaction::Loan(t) => t.seq,
            Transaction::Inquiry(t) => t.seq,
            Transaction::Insertion(t) => t.seq,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        match self {
            Transaction::Loan(t) => t.status,
            Transaction::Inquiry(t) => t.status,
            Transaction::Insertion(t) => t.status,
        }
    }

    pub fn employee(&self) -> &Employee {
        match self {
            Transaction::Loan(t) => &t.employee,
            Transaction::Inquiry(t) => &t.employee,
            Transaction::Insertion(t) => &t.employee,
        }
    }

    /// Requested quantity (the candidate's quantity for insertions).
    pub fn quantity(&self) -> i64 {
        match self {
            Transaction::Loan(t) => t.quantity,
            Transaction::Inquiry(t) => t.quantity,
            Transaction::Insertion(t) => t.item_request.quantity,
        }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Transaction::Loan(t) => t.item_id,
            Transaction::Inquiry(t) => t.item_id,
            Transaction::Insertion(t) => t.item_id,
        }
    }

    pub fn notes(&self) -> &str {
        match self {
            Transaction::Loan(t) => &t.notes,
            Transaction::Inquiry(t) => &t.notes,
            Transaction::Insertion(t) => &t.notes,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Transaction::Loan(t) => t.created_at,
            Transaction::Inquiry(t) => t.created_at,
            Transaction::Insertion(t) => t.created_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Transaction::Loan(t) => t.completed_at,
            Transaction::Inquiry(t) => t.completed_at,
            Transaction::Insertion(t) => t.completed_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        lifecycle::is_terminal(self.kind(), self.status())
    }

    /// Set by the store on insert.
    pub fn set_seq(&mut self, seq: u64) {
        match self {
            Transaction::Loan(t) => t.seq = seq,
            Transaction::Inquiry(t) => t.seq = seq,
            Transaction::Insertion(t) => t.seq = seq,
        }
    }

    /// Set by the store on every successful write.
    pub fn set_version(&mut self, version: u64) {
        match self {
            Transaction::Loan(t) => t.version = version,
            Transaction::Inquiry(t) => t.version = version,
            Transaction::Insertion(t) => t.version = version,
        }
    }

    /// Point the record at an item (insertion completion, or item deletion with `None`).
    pub fn set_item(&mut self, item_id: Option<ItemId>) {
        match self {
            Transaction::Loan(t) => t.item_id = item_id,
            Transaction::Inquiry(t) => t.item_id = item_id,
            Transaction::Insertion(t) => t.item_id = item_id,
        }
    }

    /// Compute the next record and its stock effect without touching anything.
    ///
    /// Fails with `IllegalTransition` when `target` is not allowed from the current
    /// status, and with `NotFound` when stock must move but the item link is gone.
    pub fn transition(&self, target: TransactionStatus, at: DateTime<Utc>) -> DomainResult<Transition> {
        let from = self.status();
        let movement = lifecycle::step(self.kind(), from, target)?;

        let effect = match (movement, self) {
            (StockMove::Nothing, _) => StockEffect::None,
            (StockMove::Debit, _) => StockEffect::Adjust {
                item_id: self.linked_item()?,
                delta: -self.quantity(),
            },
            (StockMove::Credit, _) => StockEffect::Adjust {
                item_id: self.linked_item()?,
                delta: self.quantity(),
            },
            (StockMove::Materialize, Transaction::Insertion(t)) => {
                StockEffect::Materialize(t.item_request.clone())
            }
            (StockMove::Materialize, _) => {
                return Err(DomainError::illegal_transition(from.as_str(), target.as_str()));
            }
        };

        let mut next = self.clone();
        next.stamp(target, at);
        Ok(Transition { from, next, effect })
    }

    fn linked_item(&self) -> DomainResult<ItemId> {
        self.item_id()
            .ok_or_else(|| DomainError::not_found(format!("item linked to {}", self.reference())))
    }

    fn stamp(&mut self, status: TransactionStatus, at: DateTime<Utc>) {
        match self {
            Transaction::Loan(t) => {
                t.status = status;
                match status {
                    TransactionStatus::Completed => t.completed_at = Some(at),
                    TransactionStatus::Returned => t.returned_at = Some(at),
                    _ => {}
                }
            }
            Transaction::Inquiry(t) => {
                t.status = status;
                if status == TransactionStatus::Completed {
                    t.completed_at = Some(at);
                }
            }
            Transaction::Insertion(t) => {
                t.status = status;
                if status == TransactionStatus::Completed {
                    t.completed_at = Some(at);
                }
            }
        }
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        match self {
            Transaction::Loan(t) => &t.id,
            Transaction::Inquiry(t) => &t.id,
            Transaction::Insertion(t) => &t.id,
        }
    }
}

impl Versioned for Transaction {
    fn version(&self) -> u64 {
        match self {
            Transaction::Loan(t) => t.version,
            Transaction::Inquiry(t) => t.version,
            Transaction::Insertion(t) => t.version,
        }
    }
}
