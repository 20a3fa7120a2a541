//! Per-transaction async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockroom_transactions::TransactionRef;

use crate::error::{StoreError, StoreResult};

/// Serializes work on the same `(kind, id)` inside one process.
///
/// Different transactions never contend. Slots nobody holds or waits on are pruned
/// on the next acquire.
#[derive(Debug, Default)]
pub struct TransactionLocks {
    slots: Mutex<HashMap<TransactionRef, Arc<AsyncMutex<()>>>>,
}

impl TransactionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, reference: TransactionRef) -> StoreResult<OwnedMutexGuard<()>> {
        let slot = {
            let mut slots = self.slots.lock().map_err(|_| StoreError::poisoned())?;
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(reference).or_default().clone()
        };
        Ok(slot.lock_owned().await)
    }

    /// Number of live slots (held or awaited).
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| Arc::strong_count(s) > 1).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
