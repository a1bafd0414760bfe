//! Pipeline stages for topic-to-video asset production.
//!
//! Each submodule implements one transformation step over the shared
//! [`crate::content::Content`] record. The orchestrator in [`crate::run`]
//! decides which stages run, persists the record after each one and turns
//! [`crate::error::StageIssue`]s into progress events.
//!
//! ## Data Flow
//!
//! ```text
//! text ──▶ segment ──▶ keywords ──▶ search ──▶ resolve ──▶ composite + caption
//! (clean)  (split+cap)  (LLM)      (query)    (download)   (frames, overlays, thumbnail)
//! ```
//!
//! 1. [`text`]      — strip blank lines, `=` headings and parentheticals
//! 2. [`segment`]   — split into sentences and cap the count
//! 3. [`keywords`]  — ask the extractor for each sentence's keywords
//! 4. [`search`]    — build one query per sentence and collect candidate URLs
//! 5. [`resolve`]   — download the first usable, not-yet-used candidate
//! 6. [`composite`] — blur-fill background frames and the thumbnail; CPU-bound
//!    work runs in `spawn_blocking`
//! 7. [`caption`]   — transparent text overlays rendered through resvg

pub mod caption;
pub mod composite;
pub mod keywords;
pub mod resolve;
pub mod search;
pub mod segment;
pub mod text;

use crate::error::{PipelineError, StageIssue};
use crate::progress::{PipelineProgressCallback, ProgressCallback};
use crate::run::Stage;
use std::path::Path;
use tracing::{debug, warn};

/// Per-sentence progress reporting for one stage.
pub struct StageEvents<'a> {
    stage: Stage,
    total: usize,
    callback: Option<&'a dyn PipelineProgressCallback>,
}

impl<'a> StageEvents<'a> {
    pub fn new(stage: Stage, total: usize, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            stage,
            total,
            callback: callback.map(|cb| cb.as_ref()),
        }
    }

    /// Events that go nowhere.
    pub fn silent(stage: Stage, total: usize) -> Self {
        Self {
            stage,
            total,
            callback: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn done(&self, index: usize) {
        if let Some(cb) = self.callback {
            cb.on_sentence_complete(self.stage, index, self.total);
        }
    }

    pub(crate) fn failed(&self, index: usize, issue: &StageIssue) {
        if let Some(cb) = self.callback {
            cb.on_sentence_error(self.stage, index, self.total, &issue.to_string());
        }
    }
}

/// Run CPU-bound image work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("Image task panicked: {}", e)))
}

/// Delete an artifact left behind by an earlier run, if there is one.
pub(crate) async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove stale {}: {}", path.display(), e),
    }
}
