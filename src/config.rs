//! Configuration types for a pipeline run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Every knob lives in one struct so two runs can
//! be compared field by field, and so the CLI is a thin mapping layer.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use crate::run::Stage;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use topic2video::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_sentences(5)
///     .content_dir("./out")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_sentences, 5);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Hard cap on script length. Default: 7.
    pub max_sentences: usize,

    /// Directory holding `content.json` and every per-sentence image. Default: `./content`.
    pub content_dir: PathBuf,

    /// Wikipedia language edition used for the source lookup. Default: `"en"`.
    pub language: String,

    /// Candidate URLs requested from the image search per sentence. Range: 1–10. Default: 2.
    ///
    /// More candidates give the resolver more fallbacks when a host refuses
    /// the download or an image was already used by an earlier sentence.
    pub images_per_query: usize,

    /// Output frame width in pixels. Default: 1920.
    pub frame_width: u32,

    /// Output frame height in pixels. Default: 1080.
    pub frame_height: u32,

    /// Gaussian sigma of the blurred background fill. Default: 9.0.
    pub blur_sigma: f32,

    /// Caption layouts, applied cyclically by sentence index. 3–7 entries.
    pub caption_cycle: Vec<CaptionTemplate>,

    /// Font family requested for caption text. Default: `"sans-serif"`.
    pub caption_font_family: String,

    /// JPEG quality of the thumbnail. Range: 1–100. Default: 85.
    pub thumbnail_quality: u8,

    /// What the compositor does for a sentence without a downloaded original.
    pub missing_image: MissingImagePolicy,

    /// What the keyword stage does when extraction fails for a sentence.
    pub keyword_failure: KeywordFailurePolicy,

    /// Load the saved state and start at this stage instead of from scratch.
    pub resume_from: Option<Stage>,

    /// Timeout for each image download and source lookup, in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Timeout for each search or LLM call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// LLM model identifier, e.g. "gpt-4.1-nano".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for keyword extraction. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per sentence. Default: 256.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed keyword call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Receives stage and sentence events while the run progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sentences: 7,
            content_dir: PathBuf::from("content"),
            language: "en".to_string(),
            images_per_query: 2,
            frame_width: 1920,
            frame_height: 1080,
            blur_sigma: 9.0,
            caption_cycle: CaptionTemplate::default_cycle(),
            caption_font_family: "sans-serif".to_string(),
            thumbnail_quality: 85,
            missing_image: MissingImagePolicy::default(),
            keyword_failure: KeywordFailurePolicy::default(),
            resume_from: None,
            download_timeout_secs: 30,
            api_timeout_secs: 60,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 256,
            max_retries: 2,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_sentences", &self.max_sentences)
            .field("content_dir", &self.content_dir)
            .field("language", &self.language)
            .field("images_per_query", &self.images_per_query)
            .field("frame", &(self.frame_width, self.frame_height))
            .field("blur_sigma", &self.blur_sigma)
            .field("caption_cycle", &self.caption_cycle)
            .field("thumbnail_quality", &self.thumbnail_quality)
            .field("missing_image", &self.missing_image)
            .field("keyword_failure", &self.keyword_failure)
            .field("resume_from", &self.resume_from)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The caption layout used for sentence `index`.
    pub fn caption_template(&self, index: usize) -> CaptionTemplate {
        self.caption_cycle[index % self.caption_cycle.len()]
    }

    /// Check every field constraint.
    ///
    /// Called by [`PipelineConfigBuilder::build`] and again at the start of
    /// every [`crate::run::Pipeline::run`].
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_sentences == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_sentences must be ≥ 1".into(),
            ));
        }
        if !(1..=10).contains(&self.images_per_query) {
            return Err(PipelineError::InvalidConfig(format!(
                "images_per_query must be 1–10, got {}",
                self.images_per_query
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "Frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be a finite value ≥ 0, got {}",
                self.blur_sigma
            )));
        }
        if !(3..=7).contains(&self.caption_cycle.len()) {
            return Err(PipelineError::InvalidConfig(format!(
                "caption_cycle must hold 3–7 templates, got {}",
                self.caption_cycle.len()
            )));
        }
        if self.caption_cycle.iter().any(|t| t.width == 0 || t.height == 0) {
            return Err(PipelineError::InvalidConfig(
                "caption templates must have a non-zero size".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(PipelineError::InvalidConfig(format!(
                "thumbnail_quality must be 1–100, got {}",
                self.thumbnail_quality
            )));
        }
        if self.language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("language must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn max_sentences(mut self, n: usize) -> Self {
        self.config.max_sentences = n;
        self
    }

    pub fn content_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.content_dir = dir.into();
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn images_per_query(mut self, n: usize) -> Self {
        self.config.images_per_query = n.clamp(1, 10);
        self
    }

    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.config.frame_width = width;
        self.config.frame_height = height;
        self
    }

    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.config.blur_sigma = sigma;
        self
    }

    pub fn caption_cycle(mut self, cycle: Vec<CaptionTemplate>) -> Self {
        self.config.caption_cycle = cycle;
        self
    }

    pub fn caption_font_family(mut self, family: impl Into<String>) -> Self {
        self.config.caption_font_family = family.into();
        self
    }

    pub fn thumbnail_quality(mut self, q: u8) -> Self {
        self.config.thumbnail_quality = q.clamp(1, 100);
        self
    }

    pub fn missing_image(mut self, policy: MissingImagePolicy) -> Self {
        self.config.missing_image = policy;
        self
    }

    pub fn keyword_failure(mut self, policy: KeywordFailurePolicy) -> Self {
        self.config.keyword_failure = policy;
        self
    }

    pub fn resume_from(mut self, stage: Stage) -> Self {
        self.config.resume_from = Some(stage);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Horizontal placement of caption text inside its canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    /// Each line centred horizontally, block centred vertically.
    Center,
    /// Lines flush left, block centred vertically.
    West,
}

/// Size and text placement of one caption overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTemplate {
    pub width: u32,
    pub height: u32,
    pub gravity: Gravity,
}

impl CaptionTemplate {
    /// A short full-width strip, text centred.
    pub const WIDE_BANNER: CaptionTemplate = CaptionTemplate {
        width: 1920,
        height: 400,
        gravity: Gravity::Center,
    };

    /// The whole frame, text centred.
    pub const FULL_FRAME: CaptionTemplate = CaptionTemplate {
        width: 1920,
        height: 1080,
        gravity: Gravity::Center,
    };

    /// A narrow full-height column, text flush left.
    pub const TALL_LEFT: CaptionTemplate = CaptionTemplate {
        width: 800,
        height: 1080,
        gravity: Gravity::West,
    };

    /// wide-banner-center → full-frame-center → tall-left, repeating.
    pub fn default_cycle() -> Vec<CaptionTemplate> {
        vec![Self::WIDE_BANNER, Self::FULL_FRAME, Self::TALL_LEFT]
    }
}

/// How the compositor treats a sentence whose original never downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingImagePolicy {
    /// Produce no composite frame for that index. (default)
    #[default]
    Skip,
    /// Produce a solid black frame so every index has a background.
    Placeholder,
}

/// How the keyword stage treats an extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeywordFailurePolicy {
    /// Record a [`crate::error::StageIssue`], leave the keywords empty and continue. (default)
    #[default]
    Degrade,
    /// Save the state as it is and stop the run with an error.
    Abort,
}
