// src/config/mod.rs
// All tunables load from the environment (with .env support); defaults are
// chosen so a bare `cargo run` works against public GitHub without a token.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct RecastConfig {
    // ── Server Configuration
    pub host: String,
    pub port: u16,
    pub cors_origin: String,

    // ── Project Storage
    pub clone_directory: String,

    // ── Status Tracking
    pub max_output_lines: usize,
    pub status_display: bool,
    pub status_display_interval: u64,
    pub stream_interval_ms: u64,

    // ── GitHub Discovery
    pub github_api_base_url: String,
    pub github_token: String,
    pub github_requests_per_minute: usize,
    pub github_search_delay_ms: u64,
    pub github_timeout: u64,

    // ── Text Generation
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout: u64,
    pub llm_max_retries: u32,

    // ── Git Operations
    pub git_command_timeout: u64,
    pub git_probe_timeout: u64,

    // ── Rewrite Pipeline
    pub worker_concurrency: usize,
    pub rewrite_file_max_bytes: u64,
    pub default_history_window_hours: i64,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Trim whitespace and strip trailing comments before parsing
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl RecastConfig {
    pub fn from_env() -> Self {
        // Load from .env first if present; missing file is fine.
        let _ = dotenvy::dotenv();

        Self {
            host: env_var_or("RECAST_HOST", "0.0.0.0".to_string()),
            port: env_var_or("RECAST_PORT", 3030),
            cors_origin: env_var_or("RECAST_CORS_ORIGIN", "http://localhost:3000".to_string()),
            clone_directory: env_var_or("RECAST_CLONE_DIRECTORY", "./projects".to_string()),
            max_output_lines: env_var_or("RECAST_MAX_OUTPUT_LINES", 1000),
            status_display: env_var_or("RECAST_STATUS_DISPLAY", false),
            status_display_interval: env_var_or("RECAST_STATUS_DISPLAY_INTERVAL", 1),
            stream_interval_ms: env_var_or("RECAST_STREAM_INTERVAL_MS", 1000),
            github_api_base_url: env_var_or(
                "GITHUB_API_BASE_URL",
                "https://api.github.com".to_string(),
            ),
            github_token: env_var_or("GITHUB_TOKEN", String::new()),
            github_requests_per_minute: env_var_or("GITHUB_REQUESTS_PER_MINUTE", 30),
            github_search_delay_ms: env_var_or("GITHUB_SEARCH_DELAY_MS", 2000),
            github_timeout: env_var_or("GITHUB_TIMEOUT", 10),
            llm_base_url: env_var_or("RECAST_LLM_BASE_URL", "https://api.anthropic.com".to_string()),
            llm_api_key: env_var_or("RECAST_LLM_API_KEY", String::new()),
            llm_model: env_var_or("RECAST_LLM_MODEL", "claude-sonnet-4-5".to_string()),
            llm_timeout: env_var_or("RECAST_LLM_TIMEOUT", 60),
            llm_max_retries: env_var_or("RECAST_LLM_MAX_RETRIES", 3),
            git_command_timeout: env_var_or("RECAST_GIT_COMMAND_TIMEOUT", 30),
            git_probe_timeout: env_var_or("RECAST_GIT_PROBE_TIMEOUT", 10),
            worker_concurrency: env_var_or("RECAST_WORKER_CONCURRENCY", 4),
            rewrite_file_max_bytes: env_var_or("RECAST_REWRITE_FILE_MAX_BYTES", 65536),
            default_history_window_hours: env_var_or("RECAST_HISTORY_WINDOW_HOURS", 24),
            log_level: env_var_or("RECAST_LOG_LEVEL", "info".to_string()),
        }
    }

    // --- Convenience Methods ---

    /// Server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// GitHub token, treating the empty string as "not configured"
    pub fn github_token_opt(&self) -> Option<&str> {
        if self.github_token.trim().is_empty() {
            None
        } else {
            Some(self.github_token.trim())
        }
    }

    /// Text generation key, treating the empty string as "not configured"
    pub fn llm_api_key_opt(&self) -> Option<&str> {
        if self.llm_api_key.trim().is_empty() {
            None
        } else {
            Some(self.llm_api_key.trim())
        }
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<RecastConfig> = Lazy::new(RecastConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = RecastConfig::from_env();
        assert!(config.bind_address().contains(':'));
    }

    #[test]
    fn test_empty_keys_read_as_unconfigured() {
        let mut config = RecastConfig::from_env();
        config.github_token = "   ".to_string();
        config.llm_api_key = String::new();
        assert!(config.github_token_opt().is_none());
        assert!(config.llm_api_key_opt().is_none());
    }

    #[test]
    fn test_defaults_are_sane() {
        let config = RecastConfig::from_env();
        assert!(config.max_output_lines > 0);
        assert!(config.worker_concurrency > 0);
        assert!(config.stream_interval_ms >= 100);
    }
}
