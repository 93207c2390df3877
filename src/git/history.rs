// src/git/history.rs
// Backdated linear-history synthesis: every commit reachable from HEAD is
// rewritten with a fresh author/committer identity, a timestamp inside the
// requested window, and a message from the generic bank.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use super::shell::{GitError, run_git, run_git_streaming};

const REWRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Evenly spread `count` timestamps across the window, with a little jitter
/// so commit spacing doesn't look machine-generated. Output is monotonic.
pub fn spread_timestamps(
    start: DateTime<Utc>,
    window_hours: i64,
    count: usize,
) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return Vec::new();
    }
    let window_secs = (window_hours.max(1) * 3600) as f64;
    let step = window_secs / count as f64;
    let mut rng = rand::rng();

    (0..count)
        .map(|i| {
            let jitter = rng.random_range(0.0..(step * 0.5).max(1.0));
            let offset = (step * i as f64 + jitter).min(window_secs);
            start + chrono::Duration::seconds(offset as i64)
        })
        .collect()
}

/// Rewrite the full history of `repo`: new identity, backdated timestamps,
/// bank messages. Every line of filter output goes to `on_line`. Returns the
/// number of commits rewritten.
pub async fn rewrite_history<F>(
    repo: &Path,
    identity: &GitIdentity,
    start: DateTime<Utc>,
    window_hours: i64,
    messages: &[String],
    on_line: F,
) -> Result<usize, GitError>
where
    F: FnMut(&str),
{
    let hashes_out = run_git(repo, &["rev-list", "--reverse", "HEAD"], REWRITE_TIMEOUT).await?;
    let hashes: Vec<&str> = hashes_out.lines().filter(|l| !l.is_empty()).collect();
    let total = hashes.len();
    if total == 0 {
        return Ok(0);
    }

    let stamps = spread_timestamps(start, window_hours, total);

    // Per-commit case arms for the env and message filters.
    let mut env_cases = String::new();
    let mut msg_cases = String::new();
    for (i, hash) in hashes.iter().enumerate() {
        let date = stamps[i].to_rfc2822();
        env_cases.push_str(&format!(
            "{hash}) export GIT_AUTHOR_DATE='{date}'; export GIT_COMMITTER_DATE='{date}';;\n"
        ));
        let message = messages
            .get(i % messages.len().max(1))
            .map(String::as_str)
            .unwrap_or("work");
        msg_cases.push_str(&format!(
            "{hash}) printf '%s' '{}';;\n",
            quote_single(message)
        ));
    }

    let env_filter = format!(
        "export GIT_AUTHOR_NAME='{name}'; export GIT_AUTHOR_EMAIL='{email}'; \
         export GIT_COMMITTER_NAME='{name}'; export GIT_COMMITTER_EMAIL='{email}'; \
         case \"$GIT_COMMIT\" in\n{env_cases}*) :;;\nesac",
        name = quote_single(&identity.name),
        email = quote_single(&identity.email),
    );
    let msg_filter = format!("case \"$GIT_COMMIT\" in\n{msg_cases}*) cat;;\nesac");

    let code = run_git_streaming(
        repo,
        &[
            "filter-branch",
            "-f",
            "--env-filter",
            &env_filter,
            "--msg-filter",
            &msg_filter,
            "HEAD",
        ],
        on_line,
    )
    .await?;

    if code != 0 {
        return Err(GitError::CommandFailed {
            command: "filter-branch".to_string(),
            code,
            detail: "history rewrite did not complete".to_string(),
        });
    }
    Ok(total)
}

static REWRITE_PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("valid progress pattern"));

/// Parse filter-branch's `Rewrite <sha> (N/M)` progress lines.
pub fn parse_rewrite_progress(line: &str) -> Option<(usize, usize)> {
    let caps = REWRITE_PROGRESS.captures(line)?;
    let done = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((done, total))
}

/// Escape a value for embedding inside a single-quoted shell string.
fn quote_single(value: &str) -> String {
    value.replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_stay_inside_window_and_ordered() {
        let start = Utc::now();
        let stamps = spread_timestamps(start, 24, 50);
        assert_eq!(stamps.len(), 50);
        let end = start + chrono::Duration::hours(24);
        for pair in stamps.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(stamps[0] >= start);
        assert!(*stamps.last().unwrap() <= end);
    }

    #[test]
    fn zero_commits_zero_timestamps() {
        assert!(spread_timestamps(Utc::now(), 24, 0).is_empty());
    }

    #[test]
    fn progress_lines_parse() {
        assert_eq!(
            parse_rewrite_progress("Rewrite 1a2b3c4d (3/17) (1 seconds passed, remaining 4 predicted)"),
            Some((3, 17))
        );
        assert_eq!(parse_rewrite_progress("Ref 'refs/heads/main' was rewritten"), None);
    }

    #[test]
    fn single_quotes_are_escaped() {
        assert_eq!(quote_single("doesn't work"), r"doesn'\''t work");
        assert_eq!(quote_single("plain"), "plain");
    }
}
