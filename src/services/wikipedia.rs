//! Source text from the MediaWiki extracts API.
//!
//! Only the introduction is requested (`exintro`) and in plain text
//! (`explaintext`) with wiki-style section markers, which the sanitiser
//! strips later.

use super::{build_client, SourceText};
use crate::error::{PipelineError, ServiceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Fetches the introduction of a Wikipedia article.
#[derive(Debug, Clone)]
pub struct WikipediaSource {
    client: reqwest::Client,
    language: String,
    timeout_secs: u64,
}

impl WikipediaSource {
    /// A client for the `language` edition (e.g. `"en"`, `"pt"`).
    pub fn new(language: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            language: language.trim().to_lowercase(),
            timeout_secs,
        })
    }

    /// The API endpoint for this language edition.
    pub fn api_url(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.language)
    }
}

#[async_trait]
impl SourceText for WikipediaSource {
    async fn fetch(&self, topic: &str) -> Result<String, ServiceError> {
        let url = self.api_url();
        info!("Fetching source text for '{}' from {}", topic, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts"),
                ("titles", topic),
                ("exsectionformat", "wiki"),
                ("explaintext", "1"),
                ("exintro", "1"),
                ("redirects", "1"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(ServiceError::Http {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let extract = first_extract(body, topic)?;
        debug!("Source text: {} bytes", extract.len());
        Ok(extract)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryPages>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: BTreeMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

/// The extract of the first page in the response.
fn first_extract(body: QueryResponse, topic: &str) -> Result<String, ServiceError> {
    let page = body
        .query
        .and_then(|q| q.pages.into_values().next())
        .ok_or_else(|| ServiceError::InvalidResponse("response has no pages".into()))?;

    if page.missing.is_some() {
        return Err(ServiceError::NotFound(topic.to_string()));
    }
    match page.extract {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ServiceError::NotFound(topic.to_string())),
    }
}
