// src/git/shell.rs
// Git plumbing via subprocess. Streaming variants forward every line of
// command output so it can be narrated into the status tracker's log.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command} failed with exit code {code}: {detail}")]
    CommandFailed {
        command: String,
        code: i32,
        detail: String,
    },

    #[error("git {command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("failed to run git {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a git command to completion in `repo`, capturing stdout. Non-zero
/// exit and timeouts both surface as errors; stderr becomes the detail.
pub async fn run_git(repo: &Path, args: &[&str], timeout: Duration) -> Result<String, GitError> {
    let command = args.join(" ");
    let result = tokio::time::timeout(
        timeout,
        Command::new("git")
            .args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .output(),
    )
    .await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(GitError::Io { command, source: e }),
        Err(_) => {
            return Err(GitError::Timeout {
                command,
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command,
            code: output.status.code().unwrap_or(-1),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command forwarding each output line (stdout and stderr, in
/// arrival order) to `on_line`. Returns the exit code; the caller decides
/// whether non-zero is fatal. Git reports clone/filter progress on stderr,
/// so both streams matter here.
pub async fn run_git_streaming<F>(
    repo: &Path,
    args: &[&str],
    mut on_line: F,
) -> Result<i32, GitError>
where
    F: FnMut(&str),
{
    let command = args.first().copied().unwrap_or("git").to_string();
    let mut child = Command::new("git")
        .args(args)
        .current_dir(repo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GitError::Io {
            command: command.clone(),
            source: e,
        })?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        on_line(&line);
    }

    let status = child.wait().await.map_err(|e| GitError::Io {
        command: command.clone(),
        source: e,
    })?;
    Ok(status.code().unwrap_or(-1))
}

/// Cheap reachability probe: `git ls-remote` against the URL, bounded by a
/// short timeout. An unreachable or slow remote is a step failure for the
/// caller, never a panic.
pub async fn probe_remote(url: &str, timeout: Duration) -> Result<(), GitError> {
    let command = format!("ls-remote {}", url);
    let result = tokio::time::timeout(
        timeout,
        Command::new("git")
            .args(["ls-remote", url])
            .stdin(Stdio::null())
            .output(),
    )
    .await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(GitError::Io { command, source: e }),
        Err(_) => {
            return Err(GitError::Timeout {
                command,
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command,
            code: output.status.code().unwrap_or(-1),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Number of commits reachable from HEAD.
pub async fn count_commits(repo: &Path, timeout: Duration) -> Result<usize, GitError> {
    let out = run_git(repo, &["rev-list", "--count", "HEAD"], timeout).await?;
    out.trim().parse().map_err(|_| GitError::CommandFailed {
        command: "rev-list --count HEAD".to_string(),
        code: 0,
        detail: format!("unparseable commit count: {}", out),
    })
}
