//! Per-call serialization
//!
//! Webhooks, audio frames, and administrative updates for the same call
//! can race. Every read-modify-write of a call record must run under this
//! registry's lock for the call id, which turns concurrent writers into a
//! queue and prevents lost updates.

use crate::domain::shared::value_objects::CallId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-call async locks
#[derive(Default)]
pub struct CallLocks {
    locks: Mutex<HashMap<CallId, Arc<Mutex<()>>>>,
}

impl CallLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one call, creating it on first use
    pub async fn acquire(&self, id: CallId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Drop the lock entry for a call that reached a terminal state
    ///
    /// Late waiters keep their cloned Arc, so releasing is safe while the
    /// lock is still held.
    pub async fn release(&self, id: CallId) {
        self.locks.lock().await.remove(&id);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
