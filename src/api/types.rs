// src/api/types.rs
// Request/response bodies for the REST surface.

use serde::{Deserialize, Serialize};

use crate::github::RepoCandidate;
use crate::project::{FileNode, ProjectInfo};
use crate::status::{StatusSummary, TaskRecord};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub technologies: Vec<String>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub total_found: usize,
    pub projects: Vec<RepoCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    pub project: RepoCandidate,
}

/// Envelope returned by every job-submission endpoint. The job itself has
/// only just started; progress and outcome are read back via the tracking id.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub success: bool,
    pub message: String,
    pub status_tracking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    #[serde(default)]
    pub target_repository_url: Option<String>,
    #[serde(default)]
    pub git_username: Option<String>,
    #[serde(default)]
    pub git_email: Option<String>,
    /// `YYYY-MM-DD`; with `start_time`, anchors the rewritten history window.
    #[serde(default)]
    pub start_date: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default = "default_window_hours")]
    pub duration_hours: i64,
    #[serde(default)]
    pub rewrite_sources: bool,
}

fn default_window_hours() -> i64 {
    24
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub current_operation: Option<String>,
    pub tasks: Vec<TaskRecord>,
    pub recent_output: Vec<String>,
    pub summary: StatusSummary,
}

/// One tick of the SSE status stream. `recent_output` carries only the lines
/// appended since the previous tick.
#[derive(Debug, Serialize)]
pub struct StreamFrame {
    pub current_operation: Option<String>,
    pub tasks: Vec<TaskRecord>,
    pub recent_output: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub removed_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectInfo>,
}

#[derive(Debug, Serialize)]
pub struct FileTreeResponse {
    pub project: String,
    pub files: Vec<FileNode>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FileContentResponse {
    pub path: String,
    pub content: String,
}
