// src/api/http/project.rs
// Browsing endpoints for cloned projects: listing, file tree, file content.

use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::error;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{FileContentResponse, FileQuery, FileTreeResponse, ProjectListResponse};
use crate::project::ProjectError;
use crate::state::AppState;

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<ProjectListResponse>> {
    let projects = state.projects.list_projects().await.map_err(|e| {
        error!("failed to list projects: {}", e);
        ApiError::internal("failed to list projects")
    })?;
    Ok(Json(ProjectListResponse { projects }))
}

pub async fn file_tree(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<FileTreeResponse>> {
    let files = state.projects.file_tree(&name).map_err(project_error)?;
    Ok(Json(FileTreeResponse { project: name, files }))
}

pub async fn file_content(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<FileContentResponse>> {
    let content = state
        .projects
        .read_file(&name, &query.path)
        .await
        .map_err(project_error)?;
    Ok(Json(FileContentResponse {
        path: query.path,
        content,
    }))
}

fn project_error(e: ProjectError) -> ApiError {
    match e {
        ProjectError::NotFound(name) => ApiError::not_found(format!("project not found: {}", name)),
        ProjectError::FileNotFound(path) => ApiError::not_found(format!("file not found: {}", path)),
        ProjectError::InvalidName(name) => {
            ApiError::bad_request(format!("invalid project name: {}", name))
        }
        ProjectError::AccessDenied(path) => ApiError::forbidden(format!("access denied: {}", path)),
        ProjectError::NotUtf8(path) => ApiError::bad_request(format!("not a text file: {}", path)),
        ProjectError::Io(e) => {
            error!("project file system error: {}", e);
            ApiError::internal("file system error")
        }
    }
}
