//! Per-thread turn locks
//!
//! A turn holds its thread's lock from the first load until the stream is
//! finished or dropped, so two turns on one thread never interleave their
//! read-then-append cycles. Different threads never contend. Entries nobody
//! holds or waits on are pruned, so the table tracks live threads only.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::ThreadId;

#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    locks: Arc<Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread`
    pub async fn acquire(&self, thread: &ThreadId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(thread.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
