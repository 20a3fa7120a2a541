//! Store boundary.
//!
//! These traits describe what the transaction engine needs from persistence without
//! assuming a backend. `InMemoryStore` and `PostgresStore` implement them.

pub mod catalog;
pub mod commit;
pub mod ledger;
pub mod log;

pub use catalog::{CatalogStore, CategoryDetail, StorageDetail};
pub use commit::{TransitionCommit, TransitionStore};
pub use ledger::{AppliedChange, AppliedEffect, StockLedger};
pub use log::TransactionLog;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Text form of a stored image for reporting.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
