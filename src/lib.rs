//! # topic2video
//!
//! Turn a topic into the raw assets of a short narrated video: a short
//! script, one picture per sentence, full-HD background frames, caption
//! overlays and a thumbnail.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic
//!  │
//!  ├─ 1. Source     article introduction from Wikipedia
//!  ├─ 2. Sanitize   drop blank lines, "=" headings and (parentheticals)
//!  ├─ 3. Segment    split into sentences, keep at most max_sentences
//!  ├─ 4. Keywords   LLM keywords per sentence (gpt-4.1-nano / claude / …)
//!  ├─ 5. Search     "<topic> <first keyword>" → Google image candidates
//!  ├─ 6. Download   first usable candidate not used by an earlier sentence
//!  ├─ 7. Composite  blur-fill 1920×1080 frames + transparent captions
//!  └─ 8. Thumbnail  first frame as JPEG
//! ```
//!
//! The shared [`Content`] record is saved to `content.json` after every
//! stage; [`PipelineConfig::resume_from`] restarts a run at any stage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topic2video::{generate, GoogleCredentials, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::builder().max_sentences(5).build()?;
//!     let google = GoogleCredentials {
//!         api_key: std::env::var("GOOGLE_API_KEY")?,
//!         search_engine_id: std::env::var("SEARCH_ENGINE_ID")?,
//!     };
//!     let report = generate("Paris", &config, google).await?;
//!     for (i, sentence) in report.content.sentences.iter().enumerate() {
//!         println!("{i}: {}", sentence.text);
//!     }
//!     eprintln!("{} issues", report.issues.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `topic2video` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! topic2video = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod content;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod services;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CaptionTemplate, Gravity, KeywordFailurePolicy, MissingImagePolicy, PipelineConfig,
    PipelineConfigBuilder,
};
pub use content::{Content, DownloadedImages, Sentence};
pub use error::{PipelineError, ServiceError, StageIssue};
pub use generate::{generate, generate_sync, write_report};
pub use output::{ArtifactIndex, ArtifactLayout, RunReport, RunStats, SentenceArtifacts};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{Pipeline, Stage};
pub use services::{
    Collaborators, GoogleCredentials, ImageFetcher, ImageSearch, KeywordExtractor, SourceText,
};
pub use state::{JsonStateStore, MemoryStateStore, StateStore};
