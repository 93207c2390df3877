// src/jobs/clone.rs

use std::sync::Arc;

use anyhow::{Result, bail};

use super::JobContext;
use crate::git;
use crate::github::RepoCandidate;
use crate::project::{ProjectMetadata, ProjectStore};

/// Clone `candidate` into the project store, narrating every line of git
/// output. The parent task `task_id` was created and started by the handler;
/// the runner wrapper completes or fails it from this function's result.
pub async fn run_clone_job(
    ctx: JobContext,
    store: Arc<ProjectStore>,
    candidate: RepoCandidate,
    task_id: String,
) -> Result<String> {
    let tracker = &ctx.tracker;
    let name = candidate.name.clone();
    let mut clone_url = candidate.clone_url.clone();
    if !clone_url.ends_with(".git") {
        clone_url.push_str(".git");
    }

    tracker.add_output_line(&format!("🚀 Cloning {} from {}", name, clone_url), "system");
    tracker.update_task(&task_id, Some(5.0), Some("Preparing destination..."));

    let dest = store.project_path(&name)?;
    if ctx.is_cancelled() {
        return Ok(format!("Clone of {} stopped before it started", name));
    }

    tracker.update_task(&task_id, Some(10.0), Some("Cloning repository..."));
    let dest_str = dest.to_string_lossy().to_string();
    let code = git::run_git_streaming(
        store.clone_dir(),
        &["clone", "--progress", &clone_url, &dest_str],
        |line| tracker.add_output_line(line, "git"),
    )
    .await?;

    if code != 0 {
        // Leave no partial clone behind.
        let _ = tokio::fs::remove_dir_all(&dest).await;
        bail!("git clone exited with code {}", code);
    }

    tracker.update_task(&task_id, Some(90.0), Some("Writing project metadata..."));
    store
        .write_metadata(&name, &ProjectMetadata::from_candidate(&candidate))
        .await?;

    tracker.add_output_line(&format!("✅ Cloned {} to {}", name, dest_str), "system");
    Ok(format!("Cloned {} to {}", name, dest_str))
}
