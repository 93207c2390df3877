// src/status/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states for a tracked task.
///
/// `Pending → Running → {Completed | Failed | Cancelled}`; a task may also
/// be cancelled before it ever starts. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// One tracked unit of long-running work.
///
/// `started_at` is set exactly once, when the task first leaves Pending;
/// `completed_at` exactly once, on the transition into a terminal state.
/// `error` is only ever set by a transition to Failed.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub progress: f32,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TaskRecord {
    pub(crate) fn new(id: &str, name: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: TaskStatus::Pending,
            progress: 0.0,
            message: message.to_string(),
            started_at: None,
            completed_at: None,
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
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn new_record_is_pending() {
        let task = TaskRecord::new("t-1", "Clone repo", "waiting");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.error.is_none());
    }
}
