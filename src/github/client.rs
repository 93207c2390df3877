// src/github/client.rs
// GitHub REST client for repository discovery. Rate limiting is handled
// client-side: a request counter over a one-minute window plus a minimum
// delay between requests, and 403s wait out X-RateLimit-Reset.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One ranked search hit, normalized from the GitHub payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoCandidate {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

struct RequestWindow {
    window_start: Instant,
    requests: usize,
    last_request: Instant,
}

pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    requests_per_minute: usize,
    min_delay: Duration,
    window: Mutex<RequestWindow>,
}

impl GitHubClient {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        requests_per_minute: usize,
        min_delay: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("recast/0.3")
            .build()
            .context("failed to build GitHub HTTP client")?;

        let now = Instant::now();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            requests_per_minute: requests_per_minute.max(1),
            min_delay,
            window: Mutex::new(RequestWindow {
                window_start: now,
                requests: 0,
                last_request: now.checked_sub(min_delay).unwrap_or(now),
            }),
        })
    }

    fn window(&self) -> MutexGuard<'_, RequestWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compute how long to wait before the next request, then wait outside
    /// the lock.
    async fn throttle(&self) {
        let wait = {
            let mut window = self.window();
            let now = Instant::now();

            if now.duration_since(window.window_start) > Duration::from_secs(60) {
                window.window_start = now;
                window.requests = 0;
            }

            let mut wait = Duration::ZERO;
            if window.requests + 1 >= self.requests_per_minute {
                let elapsed = now.duration_since(window.window_start);
                wait = Duration::from_secs(60).saturating_sub(elapsed);
                window.window_start = now + wait;
                window.requests = 0;
            }

            let since_last = now.duration_since(window.last_request);
            if since_last < self.min_delay {
                wait = wait.max(self.min_delay - since_last);
            }

            window.last_request = now + wait;
            window.requests += 1;
            wait
        };

        if !wait.is_zero() {
            debug!("GitHub throttle: sleeping {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Search repositories, newest activity first. `query` is combined with
    /// qualifier filters that bias toward small, recently pushed, original
    /// repositories.
    pub async fn search_repositories(
        &self,
        query: &str,
        per_page: usize,
        max_pages: usize,
    ) -> Result<Vec<RepoCandidate>> {
        let filtered = format!("{} fork:false in:name,description,readme", query.trim());
        let per_page = per_page.clamp(1, 100);
        let mut repositories = Vec::new();

        for page in 1..=max_pages.max(1) {
            self.throttle().await;

            let url = format!("{}/search/repositories", self.base_url);
            let mut request = self
                .http
                .get(&url)
                .header("Accept", "application/vnd.github.v3+json")
                .query(&[
                    ("q", filtered.as_str()),
                    ("sort", "updated"),
                    ("order", "desc"),
                    ("per_page", &per_page.to_string()),
                    ("page", &page.to_string()),
                ]);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("token {}", token));
            }

            let response = request.send().await.context("GitHub search request failed")?;

            if response.status().as_u16() == 403 {
                let wait = response
                    .headers()
                    .get("X-RateLimit-Reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|reset| (reset - chrono::Utc::now().timestamp()).max(0) as u64 + 1)
                    .unwrap_or(60);
                warn!("GitHub rate limited; waiting {}s", wait);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            let response = response
                .error_for_status()
                .context("GitHub search returned an error status")?;
            let data: Value = response.json().await.context("invalid GitHub response body")?;

            let Some(items) = data.get("items").and_then(Value::as_array) else {
                break;
            };
            let batch = items.len();
            repositories.extend(items.iter().filter_map(process_repository));

            // Short page means we just read the last one.
            if batch < per_page {
                break;
            }
        }

        Ok(repositories)
    }
}

/// Normalize one search item. Items without a usable name or clone URL are
/// dropped rather than surfaced half-empty.
fn process_repository(item: &Value) -> Option<RepoCandidate> {
    let name = item.get("name")?.as_str()?.to_string();
    let clone_url = item.get("clone_url")?.as_str()?.to_string();
    Some(RepoCandidate {
        name,
        full_name: item
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        html_url: item
            .get("html_url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        clone_url,
        language: item.get("language").and_then(Value::as_str).map(str::to_string),
        stars: item
            .get("stargazers_count")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        forks: item.get("forks_count").and_then(Value::as_u64).unwrap_or(0),
        topics: item
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        created_at: item.get("created_at").and_then(Value::as_str).map(str::to_string),
        updated_at: item.get("updated_at").and_then(Value::as_str).map(str::to_string),
    })
}
