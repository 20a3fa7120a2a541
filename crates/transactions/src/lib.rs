//! Transactions domain module: loans, inquiries and insertions.
//!
//! This crate contains the transaction lifecycle as pure, deterministic domain logic
//! (no IO, no storage). A transition produces the next record together with the
//! stock effect that infrastructure must commit alongside it.

pub mod employee;
pub mod inquiry;
pub mod insertion;
pub mod kind;
pub mod lifecycle;
pub mod loan;
pub mod status;
pub mod transaction;
pub mod view;

pub use employee::Employee;
pub use inquiry::{InquiryTransaction, NewInquiry};
pub use insertion::{InsertionTransaction, NewInsertion};
pub use kind::{TransactionKind, TransactionRef};
pub use lifecycle::StockMove;
pub use loan::{LoanTransaction, NewLoan};
pub use status::TransactionStatus;
pub use transaction::{StockEffect, Transaction, Transition};
pub use view::{ExportJoin, ExportRecord, TransactionView};
