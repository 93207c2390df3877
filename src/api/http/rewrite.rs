// src/api/http/rewrite.rs

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{JobAccepted, RewriteRequest};
use crate::jobs::rewrite::{RewritePlan, run_rewrite_job};
use crate::project::ProjectStore;
use crate::state::AppState;

/// Job submission for the recast pipeline. Preconditions are checked here so
/// the caller gets an immediate 4xx; everything after this returns through
/// the tracking id.
pub async fn start_rewrite(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RewriteRequest>,
) -> ApiResult<Json<JobAccepted>> {
    ProjectStore::validate_name(&name).map_err(|e| ApiError::bad_request(e.to_string()))?;
    if !state.projects.exists(&name) {
        return Err(ApiError::not_found(format!("project {} not found", name)));
    }

    let history_start =
        parse_history_start(request.start_date.as_deref(), request.start_time.as_deref())?;
    if request.rewrite_sources && state.llm.is_none() {
        return Err(ApiError::bad_request(
            "text generation is not configured; set RECAST_LLM_API_KEY",
        ));
    }
    if history_start.is_none() && !request.rewrite_sources && request.target_repository_url.is_none()
    {
        return Err(ApiError::bad_request(
            "nothing to do: provide a history start, a target URL, or enable rewrite_sources",
        ));
    }

    let project_path = state
        .projects
        .project_path(&name)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let plan = RewritePlan {
        project_name: name.clone(),
        project_path,
        target_repository_url: request.target_repository_url,
        git_username: request.git_username,
        git_email: request.git_email,
        history_start,
        window_hours: request.duration_hours.max(1),
        rewrite_sources: request.rewrite_sources,
    };

    let task_id = state.tracker.next_task_id(&format!("rewrite-{}", name));
    state.tracker.set_current_operation(&format!("Recasting {}", name));
    state
        .tracker
        .create_task(&task_id, &format!("Recast {}", name), "Starting recast pipeline...")
        .map_err(|e| ApiError::internal(e.to_string()))?;
    state.tracker.start_task(&task_id, None);

    let llm = state.llm.clone();
    let job_task_id = task_id.clone();
    state
        .jobs
        .spawn(&task_id, move |ctx| run_rewrite_job(ctx, llm, plan, job_task_id));

    Ok(Json(JobAccepted {
        success: true,
        message: format!("Started recasting {}. Check status for progress.", name),
        status_tracking_id: task_id,
    }))
}

/// Record cancellation for a tracked task and signal its job. Cooperative:
/// the job stops at its next checkpoint, not mid-subprocess.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobAccepted>> {
    if !state.jobs.cancel(&id) {
        return Err(ApiError::not_found(format!("no cancellable task with id {}", id)));
    }
    Ok(Json(JobAccepted {
        success: true,
        message: "Cancellation recorded; the job stops at its next checkpoint.".to_string(),
        status_tracking_id: id,
    }))
}

fn parse_history_start(
    date: Option<&str>,
    time: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match (date, time) {
        (Some(date), Some(time)) => {
            let parsed =
                NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M")
                    .map_err(|e| ApiError::bad_request(format!("invalid start date/time: {}", e)))?;
            Ok(Some(parsed.and_utc()))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request(
            "start_date and start_time must be provided together",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_start_parses_together_or_not_at_all() {
        assert!(parse_history_start(None, None).unwrap().is_none());
        let start = parse_history_start(Some("2024-03-01"), Some("09:30")).unwrap();
        assert!(start.is_some());
        assert!(parse_history_start(Some("2024-03-01"), None).is_err());
        assert!(parse_history_start(Some("not-a-date"), Some("09:30")).is_err());
    }
}
