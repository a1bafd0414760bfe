//! Image candidates from the Google Custom Search JSON API.

use super::{build_client, GoogleCredentials, ImageSearch};
use crate::error::{PipelineError, ServiceError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The API refuses `num` outside 1–10.
const MAX_RESULTS: usize = 10;

/// Image search through a Programmable Search Engine.
pub struct GoogleImageSearch {
    client: reqwest::Client,
    credentials: GoogleCredentials,
    timeout_secs: u64,
}

impl std::fmt::Debug for GoogleImageSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleImageSearch")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl GoogleImageSearch {
    pub fn new(credentials: GoogleCredentials, timeout_secs: u64) -> Result<Self, PipelineError> {
        if credentials.api_key.trim().is_empty() {
            return Err(PipelineError::MissingCredential {
                name: "GOOGLE_API_KEY".into(),
                hint: "Create a key in the Google Cloud console (Custom Search API).".into(),
            });
        }
        if credentials.search_engine_id.trim().is_empty() {
            return Err(PipelineError::MissingCredential {
                name: "SEARCH_ENGINE_ID".into(),
                hint: "Create a Programmable Search Engine with image search enabled.".into(),
            });
        }
        Ok(Self {
            client: build_client(timeout_secs)?,
            credentials,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, ServiceError> {
        let num = count.clamp(1, MAX_RESULTS).to_string();
        let response = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("key", self.credentials.api_key.as_str()),
                ("cx", self.credentials.search_engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(ServiceError::Http {
                url: ENDPOINT.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let links = body.links();
        debug!("Image search '{}' → {} results", query, links.len());
        Ok(links)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: String,
}

impl SearchResponse {
    /// Result links in rank order, blanks dropped.
    fn links(self) -> Vec<String> {
        self.items
            .into_iter()
            .map(|item| item.link)
            .filter(|link| !link.trim().is_empty())
            .collect()
    }
}
