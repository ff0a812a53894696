// src/utils/locks.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async locks keyed by exam id. Serializes assembly and mutation of one exam.
#[derive(Clone, Default)]
pub struct ExamLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl ExamLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `exam_id` is free. The lock is held until the guard drops.
    pub async fn acquire(&self, exam_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only referenced by the map are idle.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(exam_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }
}
