// src/api/http/clone.rs

use axum::Json;
use axum::extract::State;
use url::Url;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{CloneRequest, JobAccepted};
use crate::jobs::clone::run_clone_job;
use crate::project::ProjectStore;
use crate::state::AppState;

/// Job submission: validate synchronously, create and start the parent task,
/// schedule the clone, and return the tracking id without waiting.
pub async fn clone_project(
    State(state): State<AppState>,
    Json(request): Json<CloneRequest>,
) -> ApiResult<Json<JobAccepted>> {
    let candidate = request.project;
    let name = candidate.name.clone();

    ProjectStore::validate_name(&name).map_err(|e| ApiError::bad_request(e.to_string()))?;
    if candidate.clone_url.trim().is_empty() {
        return Err(ApiError::bad_request("clone_url is required"));
    }
    Url::parse(&candidate.clone_url)
        .map_err(|_| ApiError::bad_request("clone_url is not a valid URL"))?;
    if state.projects.exists(&name) {
        return Err(ApiError::conflict(format!("project {} already exists", name)));
    }

    let task_id = state.tracker.next_task_id(&format!("clone-{}", name));
    state.tracker.set_current_operation(&format!("Cloning {}", name));
    state
        .tracker
        .create_task(&task_id, &format!("Clone {}", name), "Starting clone...")
        .map_err(|e| ApiError::internal(e.to_string()))?;
    state.tracker.start_task(&task_id, None);

    let store = state.projects.clone();
    let job_task_id = task_id.clone();
    state
        .jobs
        .spawn(&task_id, move |ctx| run_clone_job(ctx, store, candidate, job_task_id));

    Ok(Json(JobAccepted {
        success: true,
        message: format!("Started cloning {}. Check status for progress.", name),
        status_tracking_id: task_id,
    }))
}
