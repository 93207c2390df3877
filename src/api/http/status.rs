// src/api/http/status.rs
// Read side of the status tracker: polling snapshot, SSE stream, bulk clear.
// Both read paths only ever touch snapshots, never live tracker state.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;

use crate::api::types::{ClearResponse, StatusResponse, StreamFrame};
use crate::config::CONFIG;
use crate::state::AppState;

/// One-shot snapshot: summary, every task, and the last 20 output lines.
/// Safe at any time; an idle tracker yields empty defaults.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let summary = state.tracker.summary();
    Json(StatusResponse {
        current_operation: summary.current_operation.clone(),
        tasks: state.tracker.all_tasks(),
        recent_output: state.tracker.recent_output(20),
        summary,
    })
}

/// SSE stream of status frames on a fixed cadence. Output is incremental:
/// the cursor starts at connect time, so each frame carries only lines
/// appended since the previous one. The loop ends when the client hangs up
/// and axum drops the stream.
pub async fn stream_status(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tracker = state.tracker.clone();
    let interval = Duration::from_millis(CONFIG.stream_interval_ms.max(100));

    let stream = async_stream::stream! {
        let mut cursor = tracker.output_cursor();
        loop {
            let summary = tracker.summary();
            let (new_lines, next) = tracker.output_since(cursor);
            cursor = next;

            let frame = StreamFrame {
                current_operation: summary.current_operation,
                tasks: tracker.all_tasks(),
                recent_output: new_lines,
                timestamp: chrono::Utc::now().to_rfc3339(),
            };
            let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
            yield Ok(Event::default().data(data));

            tokio::time::sleep(interval).await;
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Drop terminal tasks and wipe the output log. Running work is untouched.
pub async fn clear_status(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.tracker.clear_finished_tasks();
    state.tracker.clear_output();
    Json(ClearResponse {
        success: true,
        removed_tasks: removed,
    })
}
