use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;
use crate::retry::RetryPolicy;

use crate::{log_system_event, log_validation};

const PLACEHOLDER_API_KEY: &str = "your-api-key";

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Upstream text-generation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

/// Limits and knobs of the synthesis pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationConfig {
    pub retry_max_attempts: u32,
    pub retry_initial_delay_secs: u64,
    /// Cumulative backoff budget. `None` means `initial * 2^(attempts - 1)`.
    pub retry_max_total_wait_secs: Option<u64>,
    pub max_topics: usize,
    pub document_prefix_chars: usize,
    pub quiz_context_chars: usize,
    pub regenerated_quiz_count: usize,
    pub topic_concurrency: usize,
    pub arena_concurrency: usize,
    pub max_session_questions: usize,
    /// Substitute placeholder topics when the model is unavailable.
    pub offline_fallback: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_initial_delay_secs: 5,
            retry_max_total_wait_secs: None,
            max_topics: 5,
            document_prefix_chars: 15_000,
            quiz_context_chars: 8_000,
            regenerated_quiz_count: 5,
            topic_concurrency: 2,
            arena_concurrency: 3,
            max_session_questions: 20,
            offline_fallback: true,
        }
    }
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_secs(self.retry_initial_delay_secs),
        );
        match self.retry_max_total_wait_secs {
            Some(secs) => policy.with_max_total_wait(Duration::from_secs(secs)),
            None => policy,
        }
    }

    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let retry_max_total_wait_secs = match env::var("RETRY_MAX_TOTAL_WAIT_SECS") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("Invalid RETRY_MAX_TOTAL_WAIT_SECS value: '{}'", raw))?,
            ),
            Err(_) => None,
        };

        Ok(GenerationConfig {
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts)?,
            retry_initial_delay_secs: env_or(
                "RETRY_INITIAL_DELAY_SECS",
                defaults.retry_initial_delay_secs,
            )?,
            retry_max_total_wait_secs,
            max_topics: env_or("SYLLABUS_MAX_TOPICS", defaults.max_topics)?,
            document_prefix_chars: env_or("DOCUMENT_PREFIX_CHARS", defaults.document_prefix_chars)?,
            quiz_context_chars: env_or("QUIZ_CONTEXT_CHARS", defaults.quiz_context_chars)?,
            regenerated_quiz_count: env_or(
                "REGENERATED_QUIZ_COUNT",
                defaults.regenerated_quiz_count,
            )?,
            topic_concurrency: env_or("TOPIC_CONCURRENCY", defaults.topic_concurrency)?,
            arena_concurrency: env_or("ARENA_CONCURRENCY", defaults.arena_concurrency)?,
            max_session_questions: env_or("MAX_SESSION_QUESTIONS", defaults.max_session_questions)?,
            offline_fallback: env::var("OFFLINE_FALLBACK")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(defaults.offline_fallback),
        })
    }
}

/// Read a numeric variable, falling back to `default` when unset. A present but unparseable value
/// is an error.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            llm: LLMConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            generation: GenerationConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");

        Ok(config)
    }

    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            llm_provider = ?self.llm.effective_provider(),
            llm_model = ?self.llm.model,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            max_topics = self.generation.max_topics,
            topic_concurrency = self.generation.topic_concurrency,
            retry_max_attempts = self.generation.retry_max_attempts,
            "Configuration summary"
        );
    }

    /// Check for impossible values. Also logs the (masked) configuration summary, so call it
    /// once logging is set up.
    pub fn validate(&self) -> Result<()> {
        self.log_configuration_summary();

        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        let generation = &self.generation;
        if generation.retry_max_attempts == 0 {
            return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if generation.max_topics == 0 {
            return Err(anyhow!("SYLLABUS_MAX_TOPICS must be at least 1"));
        }
        if generation.topic_concurrency == 0 || generation.arena_concurrency == 0 {
            return Err(anyhow!("Concurrency limits must be at least 1"));
        }
        if generation.regenerated_quiz_count == 0 || generation.max_session_questions == 0 {
            return Err(anyhow!("Question counts must be at least 1"));
        }

        if !self.llm.has_credentials() && self.llm.provider != LLMProviderType::Offline {
            warn!("LLM API key appears to be placeholder or empty - running in offline mode");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(
            success,
            "configuration",
            "Configuration validation completed successfully"
        );
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:study_forge.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl LLMConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY").unwrap_or_default();
        let base_url = env::var("LLM_BASE_URL").ok();
        let provider_str = env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = parse_provider(&provider_str);
        let model = env::var("LLM_MODEL").ok();
        let timeout_secs = env_or("LLM_TIMEOUT_SECS", 120)?;

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            model,
            timeout_secs,
        })
    }

    pub fn has_credentials(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }

    /// Provider actually used: a missing or placeholder key forces offline mode.
    pub fn effective_provider(&self) -> LLMProviderType {
        if self.has_credentials() {
            self.provider
        } else {
            LLMProviderType::Offline
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_provider(raw: &str) -> LLMProviderType {
    match raw.to_lowercase().as_str() {
        "gemini" | "google" => LLMProviderType::Gemini,
        "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenAI,
        "offline" | "none" => LLMProviderType::Offline,
        _ => {
            info!("Unknown LLM provider '{}', defaulting to Gemini", raw);
            LLMProviderType::Gemini
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!(
                "Invalid PORT value: '{}'. Must be a number between 1-65535",
                port_str
            )
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,study_forge=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
