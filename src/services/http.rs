//! Plain HTTP image download.
//!
//! The body is buffered in memory: candidate images are a few megabytes at
//! most and the resolver needs the bytes to sniff the format before anything
//! is written to disk.

use super::{build_client, ImageFetcher};
use crate::error::{PipelineError, ServiceError};
use async_trait::async_trait;
use tracing::debug;

/// Downloads images with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, PipelineError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(ServiceError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if !is_acceptable_content_type(content_type.as_deref()) {
            return Err(ServiceError::NotAnImage { content_type });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout_secs))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Missing and generic binary types are accepted; the resolver sniffs the
/// bytes afterwards. Anything else must be `image/*`.
fn is_acceptable_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return true;
    };
    let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.is_empty() || mime.starts_with("image/") || mime == "application/octet-stream"
}
