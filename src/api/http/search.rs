// src/api/http/search.rs

use axum::Json;
use axum::extract::State;
use tracing::error;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// Synchronous discovery: validate, query GitHub, respond. This endpoint is
/// not a job — the caller waits for the ranked candidates.
pub async fn search_projects(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let technologies: Vec<String> = request
        .technologies
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if technologies.is_empty() {
        return Err(ApiError::bad_request("at least one technology is required"));
    }

    let query = technologies.join(" ");
    state
        .tracker
        .add_output_line(&format!("🔍 Searching GitHub for: {}", query), "system");

    let projects = state
        .github
        .search_repositories(
            &query,
            request.per_page.unwrap_or(10),
            request.max_pages.unwrap_or(1),
        )
        .await
        .map_err(|e| {
            error!("GitHub search failed: {:#}", e);
            ApiError::internal("GitHub search failed")
        })?;

    if projects.is_empty() {
        return Err(ApiError::not_found("no repositories matched the criteria"));
    }

    state.tracker.add_output_line(
        &format!("Found {} candidate repositories", projects.len()),
        "system",
    );

    Ok(Json(SearchResponse {
        success: true,
        total_found: projects.len(),
        projects,
    }))
}
