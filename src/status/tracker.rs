// src/status/tracker.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::events::{TrackerEvent, TrackerObserver};
use super::output::OutputLog;
use super::task::{TaskRecord, TaskStatus};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("task id already exists: {0}")]
    DuplicateTask(String),
}

/// Tracker tunables, normally filled from `CONFIG`.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub max_output_lines: usize,
    pub display_interval: Duration,
    /// Mirror appended output lines to the tracing console sink.
    pub echo_output: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_output_lines: 1000,
            display_interval: Duration::from_secs(1),
            echo_output: true,
        }
    }
}

#[derive(Debug, Clone)]
struct CurrentOperation {
    label: String,
    started_at: DateTime<Utc>,
}

/// Per-status task tallies. Always sums to the registry size.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}

/// Read-only roll-up of tracker state, cheap to compute and side-effect free.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub current_operation: Option<String>,
    pub operation_duration_seconds: f64,
    pub task_counts: TaskCounts,
    pub total_tasks: usize,
    pub output_lines: usize,
}

/// Centralized registry of tasks plus the shared output log and the global
/// current-operation pointer.
///
/// All mutation goes through the lifecycle operations below; each one is a
/// single short critical section (no I/O under a lock). Mutations on unknown
/// ids return `false` instead of failing — tracker inconsistency must never
/// abort the work being tracked.
pub struct StatusTracker {
    tasks: Mutex<HashMap<String, TaskRecord>>,
    output: Mutex<OutputLog>,
    current_op: Mutex<Option<CurrentOperation>>,
    observers: RwLock<Vec<Arc<dyn TrackerObserver>>>,
    running: AtomicBool,
    display: Mutex<Option<JoinHandle<()>>>,
    id_seq: AtomicU64,
    display_interval: Duration,
    echo_output: bool,
}

impl StatusTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            output: Mutex::new(OutputLog::new(config.max_output_lines)),
            current_op: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            display: Mutex::new(None),
            id_seq: AtomicU64::new(1),
            display_interval: config.display_interval,
            echo_output: config.echo_output,
        }
    }

    // A poisoned lock still holds valid bookkeeping; keep going.
    fn tasks(&self) -> MutexGuard<'_, HashMap<String, TaskRecord>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn output(&self) -> MutexGuard<'_, OutputLog> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_op(&self) -> MutexGuard<'_, Option<CurrentOperation>> {
        self.current_op.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Namespaced id that is unique for the tracker's lifetime. Callers that
    /// submit repeatable operations use this instead of hand-built ids so
    /// duplicate-id creation cannot arise.
    pub fn next_task_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.id_seq.fetch_add(1, Ordering::Relaxed))
    }

    // ========================================================================
    // Task lifecycle
    // ========================================================================

    /// Register a new Pending task. Duplicate ids are rejected; the existing
    /// record is left untouched.
    pub fn create_task(&self, id: &str, name: &str, message: &str) -> Result<TaskRecord, TrackerError> {
        let task = {
            let mut tasks = self.tasks();
            if tasks.contains_key(id) {
                return Err(TrackerError::DuplicateTask(id.to_string()));
            }
            let task = TaskRecord::new(id, name, message);
            tasks.insert(id.to_string(), task.clone());
            task
        };
        self.notify(TrackerEvent::TaskCreated(task.clone()));
        Ok(task)
    }

    /// Pending/Running → Running. Sets `started_at` on the first call only.
    pub fn start_task(&self, id: &str, message: Option<&str>) -> bool {
        let snapshot = {
            let mut tasks = self.tasks();
            let Some(task) = tasks.get_mut(id) else { return false };
            if task.status.is_terminal() {
                return false;
            }
            task.status = TaskStatus::Running;
            if task.started_at.is_none() {
                task.started_at = Some(Utc::now());
            }
            if let Some(message) = message {
                task.message = message.to_string();
            }
            task.clone()
        };
        self.notify(TrackerEvent::TaskStarted(snapshot));
        true
    }

    /// Progress/message update, valid only while Running. Progress clamps to
    /// [0, 100]; a refused update mutates nothing.
    pub fn update_task(&self, id: &str, progress: Option<f32>, message: Option<&str>) -> bool {
        let snapshot = {
            let mut tasks = self.tasks();
            let Some(task) = tasks.get_mut(id) else { return false };
            if task.status != TaskStatus::Running {
                return false;
            }
            if let Some(progress) = progress {
                task.progress = progress.clamp(0.0, 100.0);
            }
            if let Some(message) = message {
                task.message = message.to_string();
            }
            task.clone()
        };
        self.notify(TrackerEvent::TaskUpdated(snapshot));
        true
    }

    /// → Completed. Forces progress to 100 and stamps `completed_at`.
    pub fn complete_task(&self, id: &str, message: &str) -> bool {
        let Some(snapshot) = self.finish(id, TaskStatus::Completed, message, None) else {
            return false;
        };
        self.notify(TrackerEvent::TaskCompleted(snapshot));
        true
    }

    /// → Failed, recording the failure detail.
    pub fn fail_task(&self, id: &str, error: &str, message: &str) -> bool {
        let Some(snapshot) = self.finish(id, TaskStatus::Failed, message, Some(error)) else {
            return false;
        };
        self.notify(TrackerEvent::TaskFailed(snapshot));
        true
    }

    /// → Cancelled. Purely a bookkeeping transition: the job owning the task
    /// observes its cancellation token and stops on its own schedule.
    pub fn cancel_task(&self, id: &str, message: &str) -> bool {
        let Some(snapshot) = self.finish(id, TaskStatus::Cancelled, message, None) else {
            return false;
        };
        self.notify(TrackerEvent::TaskCancelled(snapshot));
        true
    }

    /// Shared terminal transition. Refused for unknown ids and for tasks that
    /// are already terminal (a terminal record is immutable).
    fn finish(
        &self,
        id: &str,
        status: TaskStatus,
        message: &str,
        error: Option<&str>,
    ) -> Option<TaskRecord> {
        let mut tasks = self.tasks();
        let task = tasks.get_mut(id)?;
        if task.status.is_terminal() {
            return None;
        }
        task.status = status;
        task.completed_at = Some(Utc::now());
        task.message = message.to_string();
        if status == TaskStatus::Completed {
            task.progress = 100.0;
        }
        if let Some(error) = error {
            task.error = Some(error.to_string());
        }
        Some(task.clone())
    }

    /// Drop every terminal task, keeping Pending/Running ones.
    pub fn clear_finished_tasks(&self) -> usize {
        let removed = {
            let mut tasks = self.tasks();
            let before = tasks.len();
            tasks.retain(|_, task| !task.status.is_terminal());
            before - tasks.len()
        };
        self.notify(TrackerEvent::TasksCleared { removed });
        removed
    }

    // ========================================================================
    // Current operation
    // ========================================================================

    pub fn set_current_operation(&self, label: &str) {
        *self.current_op() = Some(CurrentOperation {
            label: label.to_string(),
            started_at: Utc::now(),
        });
        self.add_output_line(&format!("Starting operation: {}", label), "system");
    }

    /// Clears the pointer, logging the elapsed duration. No-op when nothing
    /// is in flight.
    pub fn clear_current_operation(&self) {
        let finished = self.current_op().take();
        if let Some(op) = finished {
            let elapsed = (Utc::now() - op.started_at).num_milliseconds() as f64 / 1000.0;
            self.add_output_line(
                &format!("Completed operation: {} (took {:.2}s)", op.label, elapsed),
                "system",
            );
        }
    }

    // ========================================================================
    // Output log
    // ========================================================================

    pub fn add_output_line(&self, text: &str, source: &str) {
        let line = self.output().append(text, source);
        if self.echo_output {
            info!(target: "recast::output", "{}", line.formatted);
        }
        self.notify(TrackerEvent::OutputAdded {
            line: line.formatted,
            source: line.source,
        });
    }

    pub fn recent_output(&self, n: usize) -> Vec<String> {
        self.output().recent(n)
    }

    /// Incremental read: lines appended after `cursor` plus the new cursor.
    pub fn output_since(&self, cursor: u64) -> (Vec<String>, u64) {
        self.output().since(cursor)
    }

    /// Cursor past everything currently logged; the streaming endpoint
    /// starts here so clients only see lines appended after they connect.
    pub fn output_cursor(&self) -> u64 {
        self.output().cursor()
    }

    pub fn clear_output(&self) {
        self.output().clear();
        self.notify(TrackerEvent::OutputCleared);
    }

    // ========================================================================
    // Read side
    // ========================================================================

    pub fn summary(&self) -> StatusSummary {
        let (task_counts, total_tasks) = {
            let tasks = self.tasks();
            let mut counts = TaskCounts::default();
            for task in tasks.values() {
                match task.status {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::Running => counts.running += 1,
                    TaskStatus::Completed => counts.completed += 1,
                    TaskStatus::Failed => counts.failed += 1,
                    TaskStatus::Cancelled => counts.cancelled += 1,
                }
            }
            let total = tasks.len();
            (counts, total)
        };
        let (current_operation, operation_duration_seconds) = match self.current_op().as_ref() {
            Some(op) => (
                Some(op.label.clone()),
                (Utc::now() - op.started_at).num_milliseconds() as f64 / 1000.0,
            ),
            None => (None, 0.0),
        };
        let output_lines = self.output().len();

        StatusSummary {
            current_operation,
            operation_duration_seconds,
            task_counts,
            total_tasks,
            output_lines,
        }
    }

    /// Snapshot copy of every task, ordered by id for a stable wire shape.
    pub fn all_tasks(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self.tasks().values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Snapshot of Running tasks only.
    pub fn active_tasks(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self
            .tasks()
            .values()
            .filter(|task| task.status == TaskStatus::Running)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    pub fn get_task(&self, id: &str) -> Option<TaskRecord> {
        self.tasks().get(id).cloned()
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn add_observer(&self, observer: Arc<dyn TrackerObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn TrackerObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    /// Observers are invoked after the registry lock is released; an error
    /// from one observer never reaches the mutation call path.
    fn notify(&self, event: TrackerEvent) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            if let Err(e) = observer.on_event(&event) {
                warn!("tracker observer failed on {}: {:#}", event.kind(), e);
            }
        }
    }

    // ========================================================================
    // Display loop
    // ========================================================================

    /// Spawn the periodic console status render. Idempotent: a second call
    /// while running does nothing.
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let tracker = Arc::clone(&self);
        let interval = self.display_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !tracker.running.load(Ordering::SeqCst) {
                    break;
                }
                tracker.render_status();
            }
        });
        *self.display.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        self.add_output_line("Status tracking display started", "system");
    }

    /// Stop the display loop, waiting for the render task to wind down.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handle = self.display.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        self.add_output_line("Status tracking display stopped", "system");
    }

    /// One render pass over snapshots. Never holds a tracker lock across the
    /// actual emission.
    fn render_status(&self) {
        let summary = self.summary();
        let active = self.active_tasks();

        match &summary.current_operation {
            Some(op) => info!(
                "status: {} ({:.1}s) | {} running / {} total tasks",
                op, summary.operation_duration_seconds, summary.task_counts.running, summary.total_tasks
            ),
            None => info!(
                "status: idle | {} running / {} total tasks",
                summary.task_counts.running, summary.total_tasks
            ),
        }
        for task in active {
            info!("  {} {} {}", task.name, progress_bar(task.progress, 20), task.message);
        }
    }
}

/// `[████░░░░] 50.0%` style bar for the console render.
fn progress_bar(progress: f32, width: usize) -> String {
    let filled = ((progress / 100.0) * width as f32).round() as usize;
    let filled = filled.min(width);
    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        progress
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn tracker() -> StatusTracker {
        StatusTracker::new(TrackerConfig {
            echo_output: false,
            ..TrackerConfig::default()
        })
    }

    #[test]
    fn happy_path_create_start_update_complete() {
        let t = tracker();
        t.create_task("clone_x", "Clone X", "queued").unwrap();
        assert!(t.start_task("clone_x", Some("starting")));
        assert!(t.update_task("clone_x", Some(50.0), Some("cloning...")));
        assert!(t.complete_task("clone_x", "done"));

        let task = t.get_task("clone_x").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.message, "done");
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        assert!(task.completed_at.unwrap() >= task.started_at.unwrap());
    }

    #[test]
    fn failure_records_error_and_counts() {
        let t = tracker();
        t.create_task("git_y", "Rewrite Y", "").unwrap();
        t.start_task("git_y", None);
        assert!(t.fail_task("git_y", "timeout", "rewrite failed"));

        let task = t.get_task("git_y").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("timeout"));
        assert!(task.completed_at.is_some());
        assert_eq!(t.summary().task_counts.failed, 1);
    }

    #[test]
    fn update_requires_running() {
        let t = tracker();
        t.create_task("t", "T", "queued").unwrap();
        // Not yet started: refused, nothing mutated.
        assert!(!t.update_task("t", Some(40.0), Some("nope")));
        let task = t.get_task("t").unwrap();
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.message, "queued");

        t.start_task("t", None);
        t.complete_task("t", "done");
        // Terminal: refused, nothing mutated.
        assert!(!t.update_task("t", Some(10.0), Some("late")));
        let task = t.get_task("t").unwrap();
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.message, "done");
    }

    #[test]
    fn progress_clamps() {
        let t = tracker();
        t.create_task("t", "T", "").unwrap();
        t.start_task("t", None);
        t.update_task("t", Some(250.0), None);
        assert_eq!(t.get_task("t").unwrap().progress, 100.0);
        t.update_task("t", Some(-5.0), None);
        assert_eq!(t.get_task("t").unwrap().progress, 0.0);
    }

    #[test]
    fn unknown_ids_return_false() {
        let t = tracker();
        assert!(!t.start_task("nonexistent", None));
        assert!(!t.update_task("nonexistent", Some(10.0), None));
        assert!(!t.complete_task("nonexistent", "x"));
        assert!(!t.fail_task("nonexistent", "e", "x"));
        assert!(!t.cancel_task("nonexistent", "x"));
        assert_eq!(t.summary().total_tasks, 0);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let t = tracker();
        t.create_task("dup", "First", "original").unwrap();
        let err = t.create_task("dup", "Second", "imposter").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateTask(_)));
        // Original record untouched.
        assert_eq!(t.get_task("dup").unwrap().name, "First");
    }

    #[test]
    fn cancel_before_start() {
        let t = tracker();
        t.create_task("t", "T", "").unwrap();
        assert!(t.cancel_task("t", "cancelled before start"));
        let task = t.get_task("t").unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_some());
        // Terminal, so nothing restarts it.
        assert!(!t.start_task("t", None));
    }

    #[test]
    fn counts_sum_to_total() {
        let t = tracker();
        for i in 0..3 {
            t.create_task(&format!("p{}", i), "P", "").unwrap();
        }
        t.create_task("r", "R", "").unwrap();
        t.start_task("r", None);
        t.create_task("c", "C", "").unwrap();
        t.start_task("c", None);
        t.complete_task("c", "done");
        t.create_task("f", "F", "").unwrap();
        t.start_task("f", None);
        t.fail_task("f", "boom", "failed");

        let summary = t.summary();
        assert_eq!(summary.task_counts.total(), summary.total_tasks);
        assert_eq!(summary.task_counts.pending, 3);
        assert_eq!(summary.task_counts.running, 1);
        assert_eq!(summary.task_counts.completed, 1);
        assert_eq!(summary.task_counts.failed, 1);
    }

    #[test]
    fn clear_finished_keeps_live_tasks() {
        let t = tracker();
        t.create_task("live", "L", "").unwrap();
        t.start_task("live", None);
        t.create_task("done", "D", "").unwrap();
        t.start_task("done", None);
        t.complete_task("done", "done");

        assert_eq!(t.clear_finished_tasks(), 1);
        assert!(t.get_task("live").is_some());
        assert!(t.get_task("done").is_none());
    }

    #[test]
    fn namespaced_ids_are_unique() {
        let t = tracker();
        let a = t.next_task_id("clone-demo");
        let b = t.next_task_id("clone-demo");
        assert_ne!(a, b);
        assert!(a.starts_with("clone-demo-"));
    }

    #[test]
    fn current_operation_roundtrip() {
        let t = tracker();
        assert!(t.summary().current_operation.is_none());
        t.set_current_operation("Recasting demo");
        let summary = t.summary();
        assert_eq!(summary.current_operation.as_deref(), Some("Recasting demo"));
        t.clear_current_operation();
        assert!(t.summary().current_operation.is_none());
        // The log narrates both edges of the operation.
        let output = t.recent_output(10);
        assert!(output.iter().any(|l| l.contains("Starting operation: Recasting demo")));
        assert!(output.iter().any(|l| l.contains("Completed operation: Recasting demo")));
    }

    struct CountingObserver {
        seen: AtomicUsize,
    }

    impl TrackerObserver for CountingObserver {
        fn on_event(&self, _event: &TrackerEvent) -> anyhow::Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingObserver;

    impl TrackerObserver for FailingObserver {
        fn on_event(&self, _event: &TrackerEvent) -> anyhow::Result<()> {
            anyhow::bail!("observer exploded")
        }
    }

    #[test]
    fn observers_see_transitions_and_failures_are_contained() {
        let t = tracker();
        let counting = Arc::new(CountingObserver { seen: AtomicUsize::new(0) });
        t.add_observer(Arc::new(FailingObserver));
        t.add_observer(counting.clone());

        t.create_task("t", "T", "").unwrap();
        t.start_task("t", None);
        t.complete_task("t", "done");

        // created + started + completed, despite the failing observer.
        assert_eq!(counting.seen.load(Ordering::SeqCst), 3);
        assert_eq!(t.get_task("t").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn concurrent_mutation_of_distinct_ids() {
        let t = Arc::new(tracker());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let t = t.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..20 {
                    let id = format!("w{}-t{}", worker, i);
                    t.create_task(&id, "worker task", "").unwrap();
                    assert!(t.start_task(&id, None));
                    assert!(t.update_task(&id, Some(50.0), None));
                    assert!(t.complete_task(&id, "done"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = t.summary();
        assert_eq!(summary.total_tasks, 160);
        assert_eq!(summary.task_counts.completed, 160);
    }

    #[tokio::test]
    async fn display_loop_start_is_idempotent() {
        let t = Arc::new(tracker());
        t.clone().start();
        t.clone().start();
        t.stop().await;
        // A second stop is a no-op.
        t.stop().await;
    }

    #[test]
    fn progress_bar_shape() {
        let bar = progress_bar(50.0, 10);
        assert!(bar.contains("50.0%"));
        assert_eq!(bar.matches('█').count(), 5);
        assert_eq!(bar.matches('░').count(), 5);
    }
}
