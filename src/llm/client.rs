// src/llm/client.rs
// Text generation is an opaque capability here: hand it a prompt, get text
// back or an error. The production client speaks the Anthropic messages API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::warn;

/// Seam for everything that needs generated text. Jobs depend on this trait
/// so tests can substitute a canned generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct LlmClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build text generation HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries: max_retries.max(1),
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "max_tokens": 8192,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&request)
                .send()
                .await
                .context("text generation request failed")?;

            match response.status().as_u16() {
                200 => {
                    let body: Value = response
                        .json()
                        .await
                        .context("invalid text generation response body")?;
                    return body
                        .get("content")
                        .and_then(Value::as_array)
                        .and_then(|blocks| blocks.first())
                        .and_then(|block| block.get("text"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("text generation response had no text content"));
                }
                429 => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        bail!("rate limited after {} attempts", self.max_retries);
                    }
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    warn!("text generation rate limited, waiting {:?}", wait);
                    sleep(wait).await;
                }
                code => {
                    let detail = response.text().await.unwrap_or_default();
                    bail!("text generation API error {}: {}", code, detail);
                }
            }
        }
    }
}
