//! External collaborators consumed by the pipeline.
//!
//! Every network-facing dependency sits behind a small `async_trait` so the
//! orchestrator can be driven by in-memory doubles in tests and so a caller
//! can swap one service (say, a different image search) without touching
//! the stages.
//!
//! | Trait | Default implementation |
//! |-------|------------------------|
//! | [`SourceText`] | [`wikipedia::WikipediaSource`] |
//! | [`KeywordExtractor`] | [`llm::LlmKeywordExtractor`] |
//! | [`ImageSearch`] | [`google::GoogleImageSearch`] |
//! | [`ImageFetcher`] | [`http::HttpImageFetcher`] |

pub mod google;
pub mod http;
pub mod llm;
pub mod wikipedia;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

/// Looks up the source text for a topic.
#[async_trait]
pub trait SourceText: Send + Sync {
    /// Plain-text extract for `topic`.
    async fn fetch(&self, topic: &str) -> Result<String, ServiceError>;
}

/// Extracts ranked keywords from one sentence.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Keywords for `sentence`, most useful first.
    async fn extract(&self, sentence: &str) -> Result<Vec<String>, ServiceError>;
}

/// Searches for images matching a query.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Up to `count` image URLs, highest relevance first. Zero results is `Ok(vec![])`.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, ServiceError>;
}

/// Downloads one image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Raw bytes behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Credentials for the Google Custom Search JSON API.
#[derive(Clone)]
pub struct GoogleCredentials {
    pub api_key: String,
    pub search_engine_id: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("api_key", &"<redacted>")
            .field("search_engine_id", &self.search_engine_id)
            .finish()
    }
}

/// The full set of collaborators one run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SourceText>,
    pub keywords: Arc<dyn KeywordExtractor>,
    pub search: Arc<dyn ImageSearch>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl Collaborators {
    /// Build the default network-backed collaborators.
    ///
    /// Fails when the LLM provider cannot be resolved or the Google
    /// credentials are blank.
    pub fn from_config(
        config: &PipelineConfig,
        google: GoogleCredentials,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            source: Arc::new(wikipedia::WikipediaSource::new(
                &config.language,
                config.download_timeout_secs,
            )?),
            keywords: Arc::new(llm::LlmKeywordExtractor::from_config(config)?),
            search: Arc::new(google::GoogleImageSearch::new(
                google,
                config.api_timeout_secs,
            )?),
            fetcher: Arc::new(http::HttpImageFetcher::new(config.download_timeout_secs)?),
        })
    }
}

/// Shared `reqwest` client construction.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!(
            "topic2video/",
            env!("CARGO_PKG_VERSION"),
            " (+https://github.com/topic2video/topic2video)"
        ))
        .build()
        .map_err(|e| PipelineError::Internal(format!("Failed to build HTTP client: {}", e)))
}
