//! Progress-callback trait for stage and sentence events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks through the stages.
//!
//! # Example
//!
//! ```rust
//! use topic2video::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Downloads(AtomicUsize);
//!
//! impl PipelineProgressCallback for Downloads {
//!     fn on_sentence_complete(&self, stage: Stage, _index: usize, _total: usize) {
//!         if stage == Stage::Download {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Downloads(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::run::Stage;
use std::sync::Arc;

/// Called by the orchestrator as it processes each stage and sentence.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Sentence indices are 0-based.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called before a stage runs.
    ///
    /// `total` is the number of sentences the stage will visit (1 for stages
    /// that operate on the whole text).
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let _ = (stage, total);
    }

    /// Called when a stage finished its work for one sentence.
    fn on_sentence_complete(&self, stage: Stage, index: usize, total: usize) {
        let _ = (stage, index, total);
    }

    /// Called when a stage degraded for one sentence.
    fn on_sentence_error(&self, stage: Stage, index: usize, total: usize, error: &str) {
        let _ = (stage, index, total, error);
    }

    /// Called after a stage, once its state has been persisted.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once when the whole run is done.
    ///
    /// * `sentences` — script length
    /// * `issues`    — number of recoverable problems recorded
    fn on_run_complete(&self, sentences: usize, issues: usize) {
        let _ = (sentences, issues);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
