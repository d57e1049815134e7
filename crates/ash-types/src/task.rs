//! Task identification, status, and records for parallel batches.

use std::fmt;

/// Position of a task in its submitted batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a task.
///
/// `Pending → Running → {Succeeded, Failed, TimedOut}`. Transitions only move
/// forward; the three terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    /// Registered, worker not yet started.
    Pending,
    /// Worker started, process running.
    Running,
    /// Process exited with code 0.
    Succeeded,
    /// Process exited non-zero or could not be started.
    Failed,
    /// Process outlived the task timeout and was killed.
    TimedOut,
}

impl TaskStatus {
    /// True for `Succeeded`, `Failed` and `TimedOut`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut)
    }

    /// True for `Failed` and `TimedOut`. A timeout is a failure for reporting.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::TimedOut)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

/// One unit of parallel work and everything known about it so far.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskRecord {
    /// Position in the submitted batch.
    pub id: TaskId,
    /// The literal command string as submitted.
    pub command: String,
    /// Current status.
    pub status: TaskStatus,
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
    /// Why the task failed, if it did.
    pub error: Option<String>,
}

impl TaskRecord {
    /// A freshly registered task.
    pub fn pending(id: TaskId, command: impl Into<String>) -> Self {
        Self {
            id,
            command: command.into(),
            status: TaskStatus::Pending,
            output: String::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
    }

    #[test]
    fn timeout_counts_as_failure() {
        assert!(TaskStatus::TimedOut.is_failure());
        assert!(TaskStatus::Failed.is_failure());
        assert!(!TaskStatus::Succeeded.is_failure());
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_advance_to(TaskStatus::Succeeded));
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Failed));
        assert!(!TaskStatus::Running.can_advance_to(TaskStatus::Pending));
        assert!(!TaskStatus::Running.can_advance_to(TaskStatus::Running));
        assert!(!TaskStatus::Succeeded.can_advance_to(TaskStatus::Failed));
        assert!(!TaskStatus::TimedOut.can_advance_to(TaskStatus::Running));
    }

    #[test]
    fn record_serializes_for_embedders() {
        let mut record = TaskRecord::pending(TaskId(2), "echo hi");
        record.status = TaskStatus::Succeeded;
        record.output = "hi\n".to_string();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["command"], "echo hi");
        assert_eq!(json["status"], "Succeeded");
        assert_eq!(json["error"], serde_json::Value::Null);
    }
}
