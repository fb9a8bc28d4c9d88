use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::AnalyzerSettings;
use crate::llm_client::extract::ExtractionStrategy;
use crate::llm_client::prompts::PromptOptions;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{LlmSettings, DEFAULT_API_BASE, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    /// Shared bearer secret for `/api/v1/*`.
    pub api_key: Option<String>,
    pub require_auth: bool,
    /// Empty means permissive CORS.
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub batch_concurrency: usize,
    pub llm_call_timeout_secs: u64,
    pub llm_max_attempts: u32,
    pub llm_retry_base_ms: u64,
    pub llm_retry_max_backoff_ms: u64,
    pub extraction_strategy: ExtractionStrategy,
    pub prompt_few_shot: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            google_api_key: get("GOOGLE_AI_API_KEY").with_context(|| {
                "Required environment variable 'GOOGLE_AI_API_KEY' is not set".to_string()
            })?,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: get("API_KEY"),
            require_auth: parse_or("REQUIRE_AUTH", get("REQUIRE_AUTH"), false)?,
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_per_minute: parse_or(
                "RATE_LIMIT_PER_MINUTE",
                get("RATE_LIMIT_PER_MINUTE"),
                60,
            )?,
            batch_concurrency: parse_or("BATCH_CONCURRENCY", get("BATCH_CONCURRENCY"), 1)?,
            llm_call_timeout_secs: parse_or(
                "LLM_CALL_TIMEOUT_SECS",
                get("LLM_CALL_TIMEOUT_SECS"),
                60,
            )?,
            llm_max_attempts: parse_or("LLM_MAX_ATTEMPTS", get("LLM_MAX_ATTEMPTS"), 1)?,
            llm_retry_base_ms: parse_or("LLM_RETRY_BASE_MS", get("LLM_RETRY_BASE_MS"), 1000)?,
            llm_retry_max_backoff_ms: parse_or(
                "LLM_RETRY_MAX_BACKOFF_MS",
                get("LLM_RETRY_MAX_BACKOFF_MS"),
                30_000,
            )?,
            extraction_strategy: match get("EXTRACTION_STRATEGY") {
                Some(v) => v
                    .parse::<ExtractionStrategy>()
                    .map_err(|e: String| anyhow::anyhow!(e))
                    .context("EXTRACTION_STRATEGY is invalid")?,
                None => ExtractionStrategy::default(),
            },
            prompt_few_shot: parse_or("PROMPT_FEW_SHOT", get("PROMPT_FEW_SHOT"), false)?,
            port: parse_or("PORT", get("PORT"), 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if config.require_auth && config.api_key.is_none() {
            bail!("REQUIRE_AUTH is set but API_KEY is not");
        }
        if config.batch_concurrency == 0 {
            bail!("BATCH_CONCURRENCY must be at least 1");
        }
        if config.llm_call_timeout_secs == 0 {
            bail!("LLM_CALL_TIMEOUT_SECS must be at least 1");
        }

        Ok(config)
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.google_api_key.clone(),
            model: self.gemini_model.clone(),
            api_base: self.gemini_api_base.clone(),
            // kept just above the analyzer's per-call deadline
            request_timeout: self.call_timeout() + Duration::from_secs(5),
        }
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            retry: RetryPolicy::exponential(
                self.llm_max_attempts,
                Duration::from_millis(self.llm_retry_base_ms),
            )
            .with_max_backoff(Duration::from_millis(self.llm_retry_max_backoff_ms)),
            call_timeout: self.call_timeout(),
            strategy: self.extraction_strategy,
            prompt: PromptOptions {
                few_shot: self.prompt_few_shot,
            },
        }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_call_timeout_secs)
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}")),
    }
}
