//! Per-task mutual exclusion for load-transition-persist sequences.

use crate::task::domain::TaskId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-task async mutexes.
///
/// Operations on the same task serialize on its mutex; operations on
/// different tasks never contend. Entries are dropped once no caller holds
/// or waits for them.
#[derive(Debug, Default)]
pub(crate) struct TaskLocks {
    entries: Mutex<HashMap<TaskId, Arc<AsyncMutex<()>>>>,
}

impl TaskLocks {
    /// Waits for exclusive access to `task_id`.
    pub(crate) async fn acquire(&self, task_id: TaskId) -> TaskLockGuard<'_> {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(task_id).or_default())
        };
        let guard = lock.lock_owned().await;
        TaskLockGuard {
            locks: self,
            task_id,
            guard: Some(guard),
        }
    }

    fn release(&self, task_id: TaskId) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = entries
            .get(&task_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            entries.remove(&task_id);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one task, released on drop.
#[derive(Debug)]
pub(crate) struct TaskLockGuard<'a> {
    locks: &'a TaskLocks,
    task_id: TaskId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TaskLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.task_id);
    }
}
