// tests/http_api_test.rs
// Router-level tests driven through tower's oneshot, no live server needed.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;

use recast::api::http::router;
use recast::github::GitHubClient;
use recast::project::ProjectStore;
use recast::state::AppState;
use recast::status::{StatusTracker, TrackerConfig};

fn test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let tracker = Arc::new(StatusTracker::new(TrackerConfig {
        echo_output: false,
        ..TrackerConfig::default()
    }));
    let github = Arc::new(
        GitHubClient::new(
            "http://127.0.0.1:1", // never contacted by these tests
            None,
            30,
            Duration::from_millis(0),
            Duration::from_secs(1),
        )
        .unwrap(),
    );
    let projects = Arc::new(ProjectStore::new(dir.path()));
    (AppState::new(tracker, github, None, projects), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_running() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["service"], "recast");
}

#[tokio::test]
async fn status_snapshot_has_idle_defaults() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["current_operation"].is_null());
    assert_eq!(body["tasks"].as_array().unwrap().len(), 0);
    assert_eq!(body["summary"]["total_tasks"], 0);
    assert_eq!(body["summary"]["operation_duration_seconds"], 0.0);
    let counts = &body["summary"]["task_counts"];
    for key in ["pending", "running", "completed", "failed", "cancelled"] {
        assert_eq!(counts[key], 0);
    }
}

#[tokio::test]
async fn status_snapshot_reflects_tracker_state() {
    let (state, _dir) = test_state();
    state.tracker.create_task("t-1", "Demo", "queued").unwrap();
    state.tracker.start_task("t-1", Some("running now"));
    state.tracker.add_output_line("hello from the job", "system");

    let response = router(state)
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;

    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], "t-1");
    assert_eq!(tasks[0]["status"], "running");
    assert!(tasks[0]["started_at"].is_string());
    assert!(tasks[0]["completed_at"].is_null());
    assert!(
        body["recent_output"]
            .as_array()
            .unwrap()
            .iter()
            .any(|line| line.as_str().unwrap().contains("hello from the job"))
    );
    assert_eq!(body["summary"]["task_counts"]["running"], 1);
}

#[tokio::test]
async fn clear_drops_terminal_tasks_and_output() {
    let (state, _dir) = test_state();
    state.tracker.create_task("done", "Done", "").unwrap();
    state.tracker.start_task("done", None);
    state.tracker.complete_task("done", "finished");
    state.tracker.create_task("live", "Live", "").unwrap();
    state.tracker.start_task("live", None);

    let app = router(state.clone());
    let response = app
        .oneshot(post_json("/api/status/clear", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["removed_tasks"], 1);
    assert!(state.tracker.get_task("done").is_none());
    assert!(state.tracker.get_task("live").is_some());
    assert_eq!(state.tracker.recent_output(10).len(), 0);
}

#[tokio::test]
async fn search_requires_technologies() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(post_json("/api/search", json!({ "technologies": ["  ", ""] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn clone_rejects_invalid_input() {
    let (state, _dir) = test_state();
    let app = router(state);

    // Bad URL
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/clone",
            json!({ "project": {
                "name": "demo",
                "full_name": "someone/demo",
                "html_url": "",
                "clone_url": "not a url",
                "stars": 0,
                "forks": 0
            }}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Bad project name
    let response = app
        .oneshot(post_json(
            "/api/clone",
            json!({ "project": {
                "name": "../evil",
                "full_name": "someone/evil",
                "html_url": "",
                "clone_url": "https://github.com/someone/evil.git",
                "stars": 0,
                "forks": 0
            }}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clone_conflicts_on_existing_project() {
    let (state, dir) = test_state();
    fs::create_dir_all(dir.path().join("demo")).unwrap();

    let response = router(state)
        .oneshot(post_json(
            "/api/clone",
            json!({ "project": {
                "name": "demo",
                "full_name": "someone/demo",
                "html_url": "",
                "clone_url": "https://github.com/someone/demo.git",
                "stars": 0,
                "forks": 0
            }}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rewrite_unknown_project_is_404() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(post_json("/api/project/ghost/rewrite", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rewrite_validation_failures_create_no_tasks() {
    let (state, dir) = test_state();
    fs::create_dir_all(dir.path().join("demo")).unwrap();
    let app = router(state.clone());

    // No actions requested at all.
    let response = app
        .clone()
        .oneshot(post_json("/api/project/demo/rewrite", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Source rework without a configured generator.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/project/demo/rewrite",
            json!({ "rewrite_sources": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Date without time.
    let response = app
        .oneshot(post_json(
            "/api/project/demo/rewrite",
            json!({ "start_date": "2024-03-01" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing got tracked for any of the rejected submissions.
    assert_eq!(state.tracker.summary().total_tasks, 0);
}

#[tokio::test]
async fn cancel_unknown_task_is_404() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(post_json("/api/task/ghost/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_listing_and_files() {
    let (state, dir) = test_state();
    let project = dir.path().join("demo");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    let app = router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/projects").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["projects"][0]["name"], "demo");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/project/demo/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let paths: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"src/main.rs"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/project/demo/file?path=src/main.rs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["content"], "fn main() {}");
}

#[tokio::test]
async fn file_endpoint_rejects_traversal() {
    let (state, dir) = test_state();
    let project = dir.path().join("demo");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("inside.txt"), "inside").unwrap();
    fs::write(dir.path().join("secret.txt"), "outside").unwrap();

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/project/demo/file?path=../secret.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(
        response.status() == StatusCode::FORBIDDEN || response.status() == StatusCode::NOT_FOUND,
        "traversal must not be served, got {}",
        response.status()
    );
}

#[tokio::test]
async fn unknown_project_file_tree_is_404() {
    let (state, _dir) = test_state();
    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/project/ghost/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
