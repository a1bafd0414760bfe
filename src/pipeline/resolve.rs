//! Image resolution: pick one downloadable, not-yet-used candidate per sentence.
//!
//! Candidates are tried in search-rank order. A URL already in the run-wide
//! [`DownloadedImages`] set is skipped without a network call, so no two
//! sentences ever share a picture. The first candidate whose bytes look like
//! an image wins; the rest are never fetched.
//!
//! The winner is written to `<index>-original.png` whatever its real format.
//! Decoders downstream sniff the bytes rather than trusting the extension.
//!
//! ## Reruns
//!
//! The dedup set survives in the saved state and never shrinks. When the
//! download stage runs again over a saved state, a sentence whose original
//! is already on disk and one of whose candidates is already in the set is
//! treated as resolved; re-downloading would find every candidate "taken".

use super::{remove_stale, StageEvents};
use crate::content::{Content, DownloadedImages};
use crate::error::{ServiceError, StageIssue};
use crate::output::ArtifactLayout;
use crate::services::ImageFetcher;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why one candidate could not be used.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The payload is not in any format the image decoder recognises.
    #[error("unrecognised image data ({bytes} bytes)")]
    Undecodable { bytes: usize },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one candidate.
#[derive(Debug)]
pub enum Attempt {
    /// Downloaded and saved; the sentence is resolved.
    Downloaded(String),
    /// Already used by an earlier sentence; not fetched.
    Skipped(String),
    /// Fetched or saved unsuccessfully.
    Failed { url: String, error: DownloadError },
}

impl Attempt {
    pub fn url(&self) -> &str {
        match self {
            Attempt::Downloaded(url) | Attempt::Skipped(url) => url,
            Attempt::Failed { url, .. } => url,
        }
    }
}

/// The outcome of resolving one sentence.
#[derive(Debug)]
pub struct Resolution {
    pub index: usize,
    /// Every candidate looked at, in order.
    pub attempts: Vec<Attempt>,
    /// The saved original, if any.
    pub path: Option<PathBuf>,
    /// The original from an earlier run was kept.
    pub reused: bool,
}

impl Resolution {
    /// The URL that was downloaded in this call.
    pub fn downloaded(&self) -> Option<&str> {
        self.attempts.iter().find_map(|a| match a {
            Attempt::Downloaded(url) => Some(url.as_str()),
            _ => None,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }
}

/// Resolve one sentence against the shared dedup set.
///
/// On success the URL is added to `downloaded` and the file is written.
/// On exhaustion any stale original for `index` is removed so later stages
/// do not pick up an image from an earlier run.
pub async fn resolve_sentence(
    index: usize,
    candidates: &[String],
    downloaded: &mut DownloadedImages,
    fetcher: &dyn ImageFetcher,
    layout: &ArtifactLayout,
) -> Resolution {
    let target = layout.original(index);

    if target.is_file() && candidates.iter().any(|c| downloaded.contains(c)) {
        debug!("Sentence {}: keeping existing {}", index, target.display());
        return Resolution {
            index,
            attempts: Vec::new(),
            path: Some(target),
            reused: true,
        };
    }

    let mut attempts = Vec::with_capacity(candidates.len());
    for url in candidates {
        if downloaded.contains(url) {
            debug!("Sentence {}: skipping already used {}", index, url);
            attempts.push(Attempt::Skipped(url.clone()));
            continue;
        }

        match fetch_and_save(url, fetcher, &target).await {
            Ok(()) => {
                info!("Sentence {}: saved {} → {}", index, url, target.display());
                downloaded.insert(url.clone());
                attempts.push(Attempt::Downloaded(url.clone()));
                return Resolution {
                    index,
                    attempts,
                    path: Some(target),
                    reused: false,
                };
            }
            Err(error) => {
                warn!("Sentence {}: candidate {} failed: {}", index, url, error);
                attempts.push(Attempt::Failed {
                    url: url.clone(),
                    error,
                });
            }
        }
    }

    remove_stale(&target).await;
    Resolution {
        index,
        attempts,
        path: None,
        reused: false,
    }
}

async fn fetch_and_save(
    url: &str,
    fetcher: &dyn ImageFetcher,
    target: &Path,
) -> Result<(), DownloadError> {
    let bytes = fetcher.fetch(url).await?;
    if image::guess_format(&bytes).is_err() {
        return Err(DownloadError::Undecodable { bytes: bytes.len() });
    }
    tokio::fs::write(target, &bytes)
        .await
        .map_err(|source| DownloadError::Write {
            path: target.to_path_buf(),
            source,
        })
}

/// Resolve every sentence in order, updating `content.downloaded_images`.
pub async fn download_images(
    content: &mut Content,
    fetcher: &dyn ImageFetcher,
    layout: &ArtifactLayout,
    events: &StageEvents<'_>,
) -> Vec<StageIssue> {
    let mut issues = Vec::new();

    for index in 0..content.sentences.len() {
        let resolution = resolve_sentence(
            index,
            &content.sentences[index].images,
            &mut content.downloaded_images,
            fetcher,
            layout,
        )
        .await;

        if resolution.is_resolved() {
            events.done(index);
        } else {
            let issue = StageIssue::CandidatesExhausted {
                sentence: index,
                candidates: content.sentences[index].images.len(),
            };
            warn!("{}", issue);
            events.failed(index, &issue);
            issues.push(issue);
        }
    }

    issues
}
