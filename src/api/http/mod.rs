// src/api/http/mod.rs
// HTTP router composition for the REST API.

pub mod clone;
pub mod project;
pub mod rewrite;
pub mod search;
pub mod status;

use axum::{
    Json, Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CONFIG;
use crate::state::AppState;

/// Routes nested under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Discovery
        .route("/search", post(search::search_projects))

        // Job submission
        .route("/clone", post(clone::clone_project))
        .route("/project/{name}/rewrite", post(rewrite::start_rewrite))
        .route("/task/{id}/cancel", post(rewrite::cancel_task))

        // Status read side
        .route("/status", get(status::get_status))
        .route("/status/stream", get(status::stream_status))
        .route("/status/clear", post(status::clear_status))

        // Project browsing
        .route("/projects", get(project::list_projects))
        .route("/project/{name}/files", get(project::file_tree))
        .route("/project/{name}/file", get(project::file_content))
}

/// Full application router with middleware.
pub fn router(state: AppState) -> Router {
    let cors = match CONFIG.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "service": "recast",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
