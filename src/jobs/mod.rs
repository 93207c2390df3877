// src/jobs/mod.rs

//! Background job execution glue between HTTP handlers and long-running work.
//!
//! A handler creates and starts the parent task, then hands the actual work
//! to [`JobRunner::spawn`] and returns the tracking id immediately. The
//! runner wraps the job body so no error can escape unhandled: an `Err`
//! transitions the parent task to Failed, an `Ok(message)` completes it, and
//! either way the current-operation pointer is cleared.

pub mod clone;
pub mod rewrite;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::status::StatusTracker;

/// Everything a job body needs: the tracker for narration and bookkeeping
/// plus its own cancellation token, checked at loop iterations and before
/// external calls.
#[derive(Clone)]
pub struct JobContext {
    pub tracker: Arc<StatusTracker>,
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Spawns jobs and owns their cancellation tokens, keyed by parent task id.
pub struct JobRunner {
    tracker: Arc<StatusTracker>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl JobRunner {
    pub fn new(tracker: Arc<StatusTracker>) -> Self {
        Self {
            tracker,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `job` in the background on behalf of the already-created parent
    /// task `task_id`. The returned handle is only needed by tests; callers
    /// in the request path drop it.
    pub fn spawn<F, Fut>(&self, task_id: &str, job: F) -> JoinHandle<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let token = CancellationToken::new();
        self.tokens().insert(task_id.to_string(), token.clone());

        let tracker = self.tracker.clone();
        let tokens = self.tokens.clone();
        let id = task_id.to_string();

        tokio::spawn(async move {
            let ctx = JobContext {
                tracker: tracker.clone(),
                cancel: token,
            };
            match job(ctx).await {
                Ok(message) => {
                    // A no-op when the task was cancelled mid-flight: the
                    // record is already terminal.
                    tracker.complete_task(&id, &message);
                }
                Err(e) => {
                    error!("background job {} failed: {:#}", id, e);
                    tracker.add_output_line(&format!("Job {} failed: {:#}", id, e), "system");
                    tracker.fail_task(&id, &format!("{:#}", e), "Job failed");
                }
            }
            tracker.clear_current_operation();
            tokens.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        })
    }

    /// Record cancellation on the task and fire the job's token. Cooperative
    /// only: work already in flight (a subprocess, an API call) finishes or
    /// times out on its own. Returns false when the id is unknown or the
    /// task is already terminal.
    pub fn cancel(&self, task_id: &str) -> bool {
        let recorded = self.tracker.cancel_task(task_id, "Cancellation requested");
        if let Some(token) = self.tokens().get(task_id) {
            token.cancel();
        }
        recorded
    }

    /// Whether a job for this task id is still live (token not yet reaped).
    pub fn is_tracking(&self, task_id: &str) -> bool {
        self.tokens().contains_key(task_id)
    }
}
