// src/status/mod.rs

//! In-process status tracking for long-running operations.
//!
//! One `StatusTracker` lives in `AppState` for the lifetime of the server.
//! HTTP handlers and background jobs mutate it through lifecycle operations;
//! the polling and streaming endpoints read snapshots from it.

pub mod events;
pub mod output;
pub mod task;
pub mod tracker;

pub use events::{TrackerEvent, TrackerObserver};
pub use output::{OutputLine, OutputLog};
pub use task::{TaskRecord, TaskStatus};
pub use tracker::{StatusSummary, StatusTracker, TaskCounts, TrackerConfig, TrackerError};
