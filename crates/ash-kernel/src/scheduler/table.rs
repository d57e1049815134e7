//! The task table: shared status of every task in one batch.
//!
//! Workers write, the status reporter reads, and all of it goes through one
//! `std::sync::Mutex`. Critical sections are map lookups and clones, so the
//! lock is never held across an `.await` or a process wait.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use ash_types::{TaskId, TaskRecord, TaskStatus};

/// Status table for one batch, keyed by task id.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Mutex<BTreeMap<TaskId, TaskRecord>>,
}

impl TaskTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TaskId, TaskRecord>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a task as `Pending`.
    pub fn register(&self, id: TaskId, command: impl Into<String>) {
        self.lock().insert(id, TaskRecord::pending(id, command));
    }

    /// Move a task to `status`. Backward or repeated transitions are ignored.
    ///
    /// Returns whether the transition was applied.
    pub fn advance(&self, id: TaskId, status: TaskStatus) -> bool {
        let mut tasks = self.lock();
        match tasks.get_mut(&id) {
            Some(task) if task.status.can_advance_to(status) => {
                task.status = status;
                true
            }
            Some(task) => {
                tracing::warn!(
                    task = %id,
                    from = %task.status,
                    to = %status,
                    "ignoring backward status transition"
                );
                false
            }
            None => false,
        }
    }

    /// Store a worker's final record: status, output and error together.
    ///
    /// Returns whether the record was applied.
    pub fn finish(&self, record: &TaskRecord) -> bool {
        let mut tasks = self.lock();
        match tasks.get_mut(&record.id) {
            Some(task)
                if record.status.is_terminal() && task.status.can_advance_to(record.status) =>
            {
                task.status = record.status;
                task.output = record.output.clone();
                task.error = record.error.clone();
                true
            }
            Some(task) => {
                tracing::warn!(
                    task = %record.id,
                    from = %task.status,
                    to = %record.status,
                    "ignoring invalid final status"
                );
                false
            }
            None => false,
        }
    }

    /// A copy of one record.
    pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.lock().get(&id).cloned()
    }

    /// A copy of every record, in id order.
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.lock().values().cloned().collect()
    }

    /// True when every registered task is in a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.lock().values().all(|t| t.status.is_terminal())
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no task has been registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
