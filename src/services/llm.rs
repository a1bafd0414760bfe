//! Keyword extraction through an `edgequake-llm` chat provider.
//!
//! The model is asked for one keyword per line (see
//! [`crate::prompts::KEYWORD_SYSTEM_PROMPT`]). Models still like to decorate
//! their answers with bullets, numbering and quotes, so the reply goes
//! through [`parse_keywords`] before it reaches the state.
//!
//! ## Retry Strategy
//!
//! Rate-limit and overload errors are transient. Each failed call waits
//! `retry_backoff_ms * 2^(attempt-1)` before the next one: with the 500 ms
//! default and 2 retries that is 500 ms → 1 s.

use super::KeywordExtractor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, ServiceError};
use crate::prompts::{keyword_request, KEYWORD_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Hard cap on keywords kept per sentence.
const MAX_KEYWORDS: usize = 10;

/// Asks an LLM for the keywords of a sentence.
pub struct LlmKeywordExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmKeywordExtractor {
    /// Wrap an already-built provider, taking the call settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract(&self, sentence: &str) -> Result<Vec<String>, ServiceError> {
        let messages = vec![
            ChatMessage::system(KEYWORD_SYSTEM_PROMPT),
            ChatMessage::user(keyword_request(sentence)),
        ];
        let options = self.options();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Keywords: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Keywords: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(parse_keywords(&response.content));
                }
                Ok(Err(e)) => {
                    warn!("Keywords: attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "Keywords: attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = Some(format!("timed out after {}s", self.api_timeout_secs));
                }
            }
        }

        Err(ServiceError::Llm {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•·]+|\d+[.)])\s*").unwrap());

static RE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^keywords?\s*:\s*").unwrap());

/// Turn a model reply into a clean, de-duplicated keyword list.
///
/// Accepts one keyword per line or a comma-separated line. Strips list
/// markers, a leading `Keywords:` label, surrounding quotes and trailing
/// punctuation. Duplicates are dropped case-insensitively, keeping the first.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for line in raw.lines() {
        let line = RE_LABEL.replace(line.trim(), "");
        for part in line.split(',') {
            let part = RE_LIST_MARKER.replace(part.trim(), "");
            let keyword = part
                .trim()
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '“' | '”'))
                .trim_end_matches(|c: char| matches!(c, '.' | ';' | ':'))
                .trim();
            if keyword.is_empty() {
                continue;
            }
            if seen.insert(keyword.to_lowercase()) {
                keywords.push(keyword.to_string());
            }
            if keywords.len() == MAX_KEYWORDS {
                return keywords;
            }
        }
    }
    keywords
}

/// Resolve the LLM provider, highest priority first:
///
/// 1. a provider instance in the config
/// 2. `provider_name` + `model` from the config
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. whatever [`ProviderFactory::from_env`] finds
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
