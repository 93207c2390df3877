// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::CONFIG;
use crate::github::GitHubClient;
use crate::jobs::JobRunner;
use crate::llm::{LlmClient, TextGenerator};
use crate::project::ProjectStore;
use crate::status::{StatusTracker, TrackerConfig};

/// Everything a handler or job needs, injected once at startup. One tracker
/// per process; no hidden globals beyond `CONFIG`.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<StatusTracker>,
    pub jobs: Arc<JobRunner>,
    pub github: Arc<GitHubClient>,
    pub llm: Option<Arc<dyn TextGenerator>>,
    pub projects: Arc<ProjectStore>,
}

impl AppState {
    pub fn new(
        tracker: Arc<StatusTracker>,
        github: Arc<GitHubClient>,
        llm: Option<Arc<dyn TextGenerator>>,
        projects: Arc<ProjectStore>,
    ) -> Self {
        Self {
            jobs: Arc::new(JobRunner::new(tracker.clone())),
            tracker,
            github,
            llm,
            projects,
        }
    }
}

/// Wire the process-wide `AppState` from `CONFIG`.
pub fn build_app_state() -> anyhow::Result<AppState> {
    let tracker = Arc::new(StatusTracker::new(TrackerConfig {
        max_output_lines: CONFIG.max_output_lines,
        display_interval: Duration::from_secs(CONFIG.status_display_interval.max(1)),
        echo_output: true,
    }));

    let github = Arc::new(GitHubClient::new(
        &CONFIG.github_api_base_url,
        CONFIG.github_token_opt(),
        CONFIG.github_requests_per_minute,
        Duration::from_millis(CONFIG.github_search_delay_ms),
        Duration::from_secs(CONFIG.github_timeout),
    )?);

    let llm: Option<Arc<dyn TextGenerator>> = match CONFIG.llm_api_key_opt() {
        Some(key) => Some(Arc::new(LlmClient::new(
            &CONFIG.llm_base_url,
            key,
            &CONFIG.llm_model,
            Duration::from_secs(CONFIG.llm_timeout),
            CONFIG.llm_max_retries,
        )?)),
        None => {
            warn!("text generation disabled (RECAST_LLM_API_KEY not set)");
            None
        }
    };

    let projects = Arc::new(ProjectStore::new(&CONFIG.clone_directory));

    Ok(AppState::new(tracker, github, llm, projects))
}
