use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::{GenerationConfig, LLMConfig};
use crate::json_repair::JsonResponseParser;
use crate::llm_providers::{LLMProviderFactory, SamplingParams, TextGenerator};
use crate::log_llm_operation;
use crate::retry::{RetryOutcome, RetryPolicy, Sleeper, TokioSleeper, retry_with_backoff};

/// Shared entry point for every generator: owns the upstream client, the retry policy and the
/// pipeline limits. The generators themselves live in `syllabus`, `miner`, `arena`, `examiner`
/// and `grader` as further `impl LLMService` blocks.
#[derive(Clone)]
pub struct LLMService {
    generator: Arc<dyn TextGenerator>,
    sleeper: Arc<dyn Sleeper>,
    retry_policy: RetryPolicy,
    pub(crate) settings: GenerationConfig,
}

impl LLMService {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: GenerationConfig) -> Self {
        Self {
            generator,
            sleeper: Arc::new(TokioSleeper),
            retry_policy: settings.retry_policy(),
            settings,
        }
    }

    /// Build the provider selected by configuration. A missing API key yields the offline
    /// provider rather than an error.
    pub fn from_config(llm: &LLMConfig, settings: GenerationConfig) -> Self {
        let provider = LLMProviderFactory::create_provider(
            llm.effective_provider(),
            llm.api_key.clone(),
            llm.base_url.clone(),
            llm.model.clone(),
            llm.timeout(),
        );
        Self::new(Arc::new(provider), settings)
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub fn settings(&self) -> &GenerationConfig {
        &self.settings
    }

    /// One retried upstream call followed by JSON repair and parsing.
    ///
    /// `Ok(None)` means the retry budget ran out on transient failures. Parse failures surface as
    /// `Err(MalformedOutput)` and are never retried.
    pub(crate) async fn request_json(
        &self,
        operation: &str,
        prompt: &str,
        params: Option<SamplingParams>,
    ) -> RetryOutcome<Value> {
        let started = Instant::now();
        log_llm_operation!(start, operation, provider = self.provider_name());

        let raw = retry_with_backoff(&self.retry_policy, self.sleeper.as_ref(), operation, || {
            self.generator.generate(prompt, params)
        })
        .await?;

        let Some(raw) = raw else {
            log_llm_operation!(warn, operation, "no result after retries");
            return Ok(None);
        };

        debug!(
            operation = operation,
            response_content = %raw,
            "Raw LLM response"
        );

        let value = JsonResponseParser::parse_value(&raw).inspect_err(|e| {
            log_llm_operation!(error, operation, error = e, retry_count = 0);
        })?;

        log_llm_operation!(
            success,
            operation,
            provider = self.provider_name(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(Some(value))
    }
}

/// Leading `max_chars` characters of `text`, cut on a character boundary.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
