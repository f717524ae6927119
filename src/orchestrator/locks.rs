use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per task id.
///
/// An entry lives only while some caller holds or waits on it. Waiters clone
/// the entry's `Arc` under the map's shard lock, so a releasing guard that
/// sees itself as the last outside holder can drop the entry safely.
#[derive(Default)]
pub struct TaskLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one task id; the map entry is pruned on drop when no
/// other caller is queued for it.
pub struct TaskGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    task_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        // Release first so the guard's own Arc is not counted.
        self.guard.take();
        self.locks
            .remove_if(&self.task_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `task_id`.
    pub async fn acquire(&self, task_id: &str) -> TaskGuard<'_> {
        // Clone the Arc so the DashMap shard guard is released before awaiting.
        let lock = self
            .locks
            .entry(task_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        TaskGuard {
            locks: &self.locks,
            task_id: task_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Task ids currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
