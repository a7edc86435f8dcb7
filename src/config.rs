//! Environment-driven configuration for a swarm run.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::backoff::RetryPolicy;

/// Default OpenRouter model (free tier, tool-capable).
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MAX_ITERATIONS: u32 = 20;
const DEFAULT_AUDIT_SAMPLE: usize = 5;
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Top-level swarm configuration.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Iteration ceiling for the orchestration loop.
    pub max_iterations: u32,
    /// How many files the Auditor inspects (cost/coverage trade-off).
    pub audit_sample: usize,
    pub retry: RetryPolicy,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl SwarmConfig {
    /// Load from the environment. Only the API key is mandatory.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .context("OPENROUTER_API_KEY is not set (required for the model provider)")?;
        Ok(Self {
            model: std::env::var("SWARM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            base_url: std::env::var("SWARM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key,
            temperature: env_parse("SWARM_TEMPERATURE", 0.0),
            max_tokens: env_parse("SWARM_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            request_timeout_secs: env_parse("SWARM_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS),
            max_iterations: env_parse("SWARM_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS),
            audit_sample: env_parse("SWARM_AUDIT_SAMPLE", DEFAULT_AUDIT_SAMPLE),
            retry: RetryPolicy {
                max_attempts: env_parse("SWARM_RETRY_ATTEMPTS", 4),
                base_delay: Duration::from_secs(env_parse("SWARM_RETRY_BASE_SECS", 2)),
                max_delay: Duration::from_secs(env_parse("SWARM_RETRY_MAX_SECS", 30)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_garbage() {
        // Key is unset in the test environment.
        assert_eq!(env_parse("SWARM_DEFINITELY_UNSET_KEY", 7u32), 7);
    }
}
