//! Keyed critical sections
//!
//! One async mutex per key (attempt id, or assessment/student pair on
//! start). Entries are weak so idle keys do not accumulate.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(key.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    /// Wait up to `timeout` for exclusive access to `key`
    pub async fn acquire(&self, key: &str, timeout: Duration) -> AppResult<OwnedMutexGuard<()>> {
        let slot = self.slot(key);
        tokio::time::timeout(timeout, slot.lock_owned())
            .await
            .map_err(|_| AppError::Conflict(format!("{} is busy, retry later", key)))
    }

    /// Keys with a live holder or waiter
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
