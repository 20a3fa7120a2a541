//! Per-kind transition tables.
//!
//! Stock moves at exactly two points: `completed` (debit for loans and inquiries,
//! materialize for insertions) and a loan's `returned` after `completed` (credit).
//! `rejected` is only reachable from states that have not moved stock.

use stockroom_core::{DomainError, DomainResult};

use crate::kind::TransactionKind;
use crate::status::TransactionStatus;

/// Stock side effect a legal transition requires.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockMove {
    Nothing,
    /// Take the requested quantity out of the linked item.
    Debit,
    /// Put the requested quantity back into the linked item.
    Credit,
    /// Create or merge the insertion's candidate item.
    Materialize,
}

/// Look up `from -> to` in the table for `kind`.
pub fn step(
    kind: TransactionKind,
    from: TransactionStatus,
    to: TransactionStatus,
) -> DomainResult<StockMove> {
    use TransactionStatus::*;

    let allowed = match kind {
        TransactionKind::Loan => match (from, to) {
            (Pending | Approved | Incomplete, Completed) => Some(StockMove::Debit),
            (Pending | Incomplete, Approved) => Some(StockMove::Nothing),
            (Pending | Approved, Incomplete) => Some(StockMove::Nothing),
            (Pending | Approved | Incomplete, Rejected) => Some(StockMove::Nothing),
            // Nothing was debited before completion, so an early return credits nothing.
            (Approved, Returned) => Some(StockMove::Nothing),
            (Completed, Returned) => Some(StockMove::Credit),
            _ => None,
        },
        TransactionKind::Inquiry => match (from, to) {
            (Pending | Approved | Incomplete, Completed) => Some(StockMove::Debit),
            (Pending | Incomplete, Approved) => Some(StockMove::Nothing),
            (Pending | Approved, Incomplete) => Some(StockMove::Nothing),
            (Pending | Approved | Incomplete, Rejected) => Some(StockMove::Nothing),
            _ => None,
        },
        TransactionKind::Insertion => match (from, to) {
            (Pending | Approved, Completed) => Some(StockMove::Materialize),
            (Pending, Approved) => Some(StockMove::Nothing),
            (Pending | Approved, Rejected) => Some(StockMove::Nothing),
            _ => None,
        },
    };

    allowed.ok_or_else(|| DomainError::illegal_transition(from.as_str(), to.as_str()))
}

/// No legal transition leaves `status` for this kind.
pub fn is_terminal(kind: TransactionKind, status: TransactionStatus) -> bool {
    TransactionStatus::ALL
        .into_iter()
        .all(|to| step(kind, status, to).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionStatus::*;

    #[test]
    fn same_status_is_never_legal() {
        for kind in TransactionKind::ALL {
            for status in TransactionStatus::ALL {
                assert!(step(kind, status, status).is_err(), "{kind} {status}");
            }
        }
    }

    #[test]
    fn loan_return_credits_only_after_completion() {
        assert_eq!(step(TransactionKind::Loan, Completed, Returned), Ok(StockMove::Credit));
        assert_eq!(step(TransactionKind::Loan, Approved, Returned), Ok(StockMove::Nothing));
        assert!(step(TransactionKind::Loan, Pending, Returned).is_err());
        assert!(step(TransactionKind::Loan, Returned, Returned).is_err());
    }

    #[test]
    fn inquiries_never_return() {
        for from in TransactionStatus::ALL {
            assert!(step(TransactionKind::Inquiry, from, Returned).is_err());
        }
    }

    #[test]
    fn insertions_have_no_incomplete_state() {
        for from in TransactionStatus::ALL {
            assert!(step(TransactionKind::Insertion, from, Incomplete).is_err());
        }
    }

    #[test]
    fn terminal_states_per_kind() {
        assert!(is_terminal(TransactionKind::Loan, Returned));
        assert!(is_terminal(TransactionKind::Loan, Rejected));
        assert!(!is_terminal(TransactionKind::Loan, Completed));
        assert!(is_terminal(TransactionKind::Inquiry, Completed));
        assert!(is_terminal(TransactionKind::Insertion, Completed));
        assert!(!is_terminal(TransactionKind::Insertion, Pending));
    }

    #[test]
    fn rejection_only_from_states_without_stock_movement() {
        for kind in TransactionKind::ALL {
            for from in [Completed, Returned, Rejected] {
                match step(kind, from, Rejected) {
                    Err(DomainError::IllegalTransition { .. }) => {}
                    other => panic!("{kind}: {from} -> rejected gave {other:?}"),
                }
            }
        }
    }
}
