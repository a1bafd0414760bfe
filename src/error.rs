//! Error types for the topic2video library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot continue (invalid
//!   configuration, unreadable or unwritable state file, keyword extraction
//!   failure under [`crate::config::KeywordFailurePolicy::Abort`]). Returned as
//!   `Err(PipelineError)` from [`crate::run::Pipeline::run`].
//!
//! * [`StageIssue`] — **Non-fatal**: one stage degraded for one sentence (no
//!   source text, no downloadable candidate, a frame that failed to render).
//!   Collected into [`crate::output::RunReport::issues`] so callers can inspect
//!   partial success instead of losing the whole run to one bad image.
//!
//! * [`ServiceError`] — what an external collaborator (Wikipedia, the LLM,
//!   the image search API, an image host) reported. Stages translate these
//!   into one of the two types above.

use std::path::PathBuf;
use thiserror::Error;

use crate::run::Stage;

/// All fatal errors returned by the topic2video library.
///
/// Sentence-level failures use [`StageIssue`] and are stored in
/// [`crate::output::RunReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required credential was not supplied.
    #[error("Missing credential '{name}'.\n{hint}")]
    MissingCredential { name: String, hint: String },

    // ── State errors ──────────────────────────────────────────────────────
    /// The state file exists but could not be read.
    #[error("Failed to read state file '{path}': {source}")]
    StateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file was read but does not contain a valid `Content` record.
    #[error("State file '{path}' is corrupt: {detail}")]
    StateCorrupt { path: PathBuf, detail: String },

    /// The state file could not be written.
    #[error("Failed to write state file '{path}': {source}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Resuming was requested but no prior state exists.
    #[error("Cannot resume from stage '{stage}': no saved state found")]
    NothingToResume { stage: Stage },

    /// The saved state belongs to another topic.
    #[error("Saved state is for topic '{saved}', not '{requested}'")]
    TopicMismatch { saved: String, requested: String },

    /// The content directory could not be created.
    #[error("Failed to create content directory '{path}': {source}")]
    ContentDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run report could not be written.
    #[error("Failed to write report '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// Keyword extraction failed and the configured policy is to abort.
    #[error("Keyword extraction failed for sentence {sentence}: {detail}")]
    KeywordExtraction { sentence: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem recorded while running one stage.
///
/// The run continues after every variant; a completed run may carry any
/// number of these alongside a fully persisted state.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageIssue {
    /// The source-text lookup failed; the script is empty.
    #[error("Source text for '{topic}' unavailable: {detail}")]
    SourceUnavailable { topic: String, detail: String },

    /// Keyword extraction failed; the sentence keeps an empty keyword list.
    #[error("Sentence {sentence}: keyword extraction failed: {detail}")]
    KeywordsFailed { sentence: usize, detail: String },

    /// The image search call failed; the sentence has no candidates.
    #[error("Sentence {sentence}: image search failed: {detail}")]
    SearchFailed { sentence: usize, detail: String },

    /// No candidate could be downloaded for the sentence.
    #[error("Sentence {sentence}: none of {candidates} image candidates could be downloaded")]
    CandidatesExhausted { sentence: usize, candidates: usize },

    /// Compositing, caption rendering or thumbnail encoding failed.
    #[error("Sentence {sentence:?}: processing '{path}' failed: {detail}")]
    ProcessingFailed {
        sentence: Option<usize>,
        path: PathBuf,
        detail: String,
    },
}

impl StageIssue {
    /// The sentence index this issue is about, if it is sentence-scoped.
    pub fn sentence(&self) -> Option<usize> {
        match self {
            StageIssue::SourceUnavailable { .. } => None,
            StageIssue::KeywordsFailed { sentence, .. }
            | StageIssue::SearchFailed { sentence, .. }
            | StageIssue::CandidatesExhausted { sentence, .. } => Some(*sentence),
            StageIssue::ProcessingFailed { sentence, .. } => *sentence,
        }
    }
}

/// A failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from '{url}'")]
    Http { url: String, status: u16 },

    /// The request did not complete (DNS, TLS, connection reset …).
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered but the payload could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A download succeeded but the payload is not an image.
    #[error("not an image (content type {content_type:?})")]
    NotAnImage { content_type: Option<String> },

    /// The LLM call failed after all retries.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Llm { retries: u32, detail: String },
}

impl ServiceError {
    /// Map a `reqwest` transport error, keeping timeouts distinguishable.
    ///
    /// The request URL is dropped from the message: query strings carry API
    /// keys, and the message ends up in logs and the run report.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout { secs: timeout_secs }
        } else {
            ServiceError::Network(err.without_url().to_string())
        }
    }
}
