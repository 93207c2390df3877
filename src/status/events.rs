// src/status/events.rs

use super::task::TaskRecord;

/// Everything the tracker can tell an observer. One variant per lifecycle
/// transition plus the output-log events, each carrying a snapshot copy.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    TaskCreated(TaskRecord),
    TaskStarted(TaskRecord),
    TaskUpdated(TaskRecord),
    TaskCompleted(TaskRecord),
    TaskFailed(TaskRecord),
    TaskCancelled(TaskRecord),
    TasksCleared { removed: usize },
    OutputAdded { line: String, source: String },
    OutputCleared,
}

impl TrackerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerEvent::TaskCreated(_) => "task_created",
            TrackerEvent::TaskStarted(_) => "task_started",
            TrackerEvent::TaskUpdated(_) => "task_updated",
            TrackerEvent::TaskCompleted(_) => "task_completed",
            TrackerEvent::TaskFailed(_) => "task_failed",
            TrackerEvent::TaskCancelled(_) => "task_cancelled",
            TrackerEvent::TasksCleared { .. } => "tasks_cleared",
            TrackerEvent::OutputAdded { .. } => "output_added",
            TrackerEvent::OutputCleared => "output_cleared",
        }
    }
}

/// Observer seam for status events. An `Err` from `on_event` is logged and
/// swallowed by the tracker; a misbehaving observer cannot break task
/// bookkeeping. Observers run outside the tracker's locks and must not block.
pub trait TrackerObserver: Send + Sync {
    fn on_event(&self, event: &TrackerEvent) -> anyhow::Result<()>;
}
