//! Pipeline orchestration.
//!
//! [`Pipeline::run`] owns the [`Content`] record for one topic and walks it
//! through every [`Stage`] in order. After each stage the record is saved,
//! so a failed or interrupted run can be picked up again with
//! [`PipelineConfig::resume_from`].
//!
//! Stages never retry as a whole. Retries happen inside the stages: per
//! candidate in the resolver, per call in the keyword extractor.

use crate::config::PipelineConfig;
use crate::content::Content;
use crate::error::{PipelineError, StageIssue};
use crate::output::{ArtifactIndex, ArtifactLayout, RunReport, RunStats, StageTiming};
use crate::pipeline::composite::ThumbnailOutcome;
use crate::pipeline::{caption, composite, keywords, resolve, search, segment, text, StageEvents};
use crate::services::Collaborators;
use crate::state::{JsonStateStore, StateStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One phase of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Look up the source text.
    Source,
    /// Strip blank lines, headings and parentheticals.
    Sanitize,
    /// Split into sentences and cap the count.
    Segment,
    /// Extract keywords per sentence.
    Keywords,
    /// Build queries and collect image candidates.
    Search,
    /// Download one image per sentence.
    Download,
    /// Background frames and caption overlays.
    Composite,
    /// JPEG thumbnail from the first frame.
    Thumbnail,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Source,
        Stage::Sanitize,
        Stage::Segment,
        Stage::Keywords,
        Stage::Search,
        Stage::Download,
        Stage::Composite,
        Stage::Thumbnail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Sanitize => "sanitize",
            Stage::Segment => "segment",
            Stage::Keywords => "keywords",
            Stage::Search => "search",
            Stage::Download => "download",
            Stage::Composite => "composite",
            Stage::Thumbnail => "thumbnail",
        }
    }

    /// Progress events the stage emits for `sentences` sentences.
    ///
    /// `Composite` reports each index twice: once for the frame, once for
    /// the caption. Whole-text stages report one unit, at index 0.
    pub fn work_units(self, sentences: usize) -> usize {
        match self {
            Stage::Keywords | Stage::Search | Stage::Download => sentences,
            Stage::Composite => sentences * 2,
            Stage::Source | Stage::Sanitize | Stage::Segment | Stage::Thumbnail => 1,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Stage::ALL.iter().map(|s| s.name()).collect();
                format!("unknown stage '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Runs the stages for one topic against a set of collaborators.
pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    store: Arc<dyn StateStore>,
    layout: ArtifactLayout,
}

impl Pipeline {
    /// A pipeline that persists to `content.json` in the content directory.
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let store = Arc::new(JsonStateStore::in_dir(&config.content_dir));
        let layout = ArtifactLayout::new(&config.content_dir);
        Self {
            config,
            collaborators,
            store,
            layout,
        }
    }

    /// Replace the state store.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Run every stage for `topic`, or the stages from
    /// [`PipelineConfig::resume_from`] on.
    ///
    /// Per-sentence failures are collected in [`RunReport::issues`]; only
    /// state I/O, an invalid config or topic, and an aborting keyword failure
    /// return `Err`.
    pub async fn run(&self, topic: &str) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        self.config.validate()?;
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::InvalidConfig("topic must not be empty".into()));
        }

        tokio::fs::create_dir_all(self.layout.dir())
            .await
            .map_err(|source| PipelineError::ContentDir {
                path: self.layout.dir().to_path_buf(),
                source,
            })?;

        let mut content = self.initial_content(topic)?;
        let first = self.config.resume_from.unwrap_or(Stage::Source);
        info!(
            "Running '{}' from stage '{}' into {}",
            topic,
            first,
            self.layout.dir().display()
        );

        let cb = self.config.progress_callback.as_ref();
        let mut issues: Vec<StageIssue> = Vec::new();
        let mut timings = Vec::new();

        for stage in Stage::ALL.into_iter().filter(|s| *s >= first) {
            let total = stage.work_units(content.sentences.len());
            if let Some(cb) = cb {
                cb.on_stage_start(stage, total);
            }
            let stage_start = Instant::now();
            let events = StageEvents::new(stage, total, cb);

            match self.run_stage(stage, &mut content, &events).await {
                Ok(stage_issues) => issues.extend(stage_issues),
                Err(e) => {
                    // Keep whatever the stage completed before failing.
                    self.store.save(&content)?;
                    return Err(e);
                }
            }

            self.store.save(&content)?;
            let duration_ms = stage_start.elapsed().as_millis() as u64;
            info!("Stage '{}' done in {}ms", stage, duration_ms);
            timings.push(StageTiming { stage, duration_ms });
            if let Some(cb) = cb {
                cb.on_stage_complete(stage);
            }
        }

        let artifacts = ArtifactIndex::scan(&self.layout, content.sentences.len());
        let stats = RunStats::collect(
            &content,
            &artifacts,
            &issues,
            timings,
            start.elapsed().as_millis() as u64,
        );
        info!(
            "Run complete: {} sentences, {} originals, {} frames, {} issues",
            stats.sentences,
            stats.originals,
            stats.composites,
            issues.len()
        );
        if let Some(cb) = cb {
            cb.on_run_complete(content.sentences.len(), issues.len());
        }

        Ok(RunReport {
            content,
            artifacts,
            issues,
            stats,
        })
    }

    /// A fresh record, or the saved one when resuming.
    fn initial_content(&self, topic: &str) -> Result<Content, PipelineError> {
        let Some(stage) = self.config.resume_from.filter(|s| *s > Stage::Source) else {
            return Ok(Content::new(topic, self.config.max_sentences));
        };

        let saved = self
            .store
            .load()?
            .ok_or(PipelineError::NothingToResume { stage })?;
        if saved.search_term != topic {
            return Err(PipelineError::TopicMismatch {
                saved: saved.search_term,
                requested: topic.to_string(),
            });
        }
        info!(
            "Resuming '{}' with {} saved sentences",
            topic,
            saved.sentences.len()
        );
        Ok(saved)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        content: &mut Content,
        events: &StageEvents<'_>,
    ) -> Result<Vec<StageIssue>, PipelineError> {
        let c = &self.collaborators;
        match stage {
            Stage::Source => match c.source.fetch(&content.search_term).await {
                Ok(text) => {
                    content.source_content_original = text;
                    events.done(0);
                    Ok(Vec::new())
                }
                Err(e) => {
                    warn!("Source text for '{}' unavailable: {}", content.search_term, e);
                    content.source_content_original.clear();
                    let issue = StageIssue::SourceUnavailable {
                        topic: content.search_term.clone(),
                        detail: e.to_string(),
                    };
                    events.failed(0, &issue);
                    Ok(vec![issue])
                }
            },
            Stage::Sanitize => {
                content.source_content_sanitized = text::sanitize(&content.source_content_original);
                events.done(0);
                Ok(Vec::new())
            }
            Stage::Segment => {
                content.sentences =
                    segment::segment(&content.source_content_sanitized, content.maximum_sentences);
                info!("Segmented into {} sentences", content.sentences.len());
                events.done(0);
                Ok(Vec::new())
            }
            Stage::Keywords => {
                keywords::extract_keywords(
                    content,
                    c.keywords.as_ref(),
                    self.config.keyword_failure,
                    events,
                )
                .await
            }
            Stage::Search => Ok(search::search_images(
                content,
                c.search.as_ref(),
                self.config.images_per_query,
                events,
            )
            .await),
            Stage::Download => Ok(resolve::download_images(
                content,
                c.fetcher.as_ref(),
                &self.layout,
                events,
            )
            .await),
            Stage::Composite => {
                let mut issues =
                    composite::render_frames(content, &self.config, &self.layout, events).await?;
                issues.extend(
                    caption::render_captions(content, &self.config, &self.layout, events).await?,
                );
                Ok(issues)
            }
            Stage::Thumbnail => {
                match composite::render_thumbnail(
                    &self.layout,
                    content.sentences.len(),
                    self.config.thumbnail_quality,
                )
                .await?
                {
                    ThumbnailOutcome::Failed(issue) => {
                        events.failed(0, &issue);
                        Ok(vec![issue])
                    }
                    ThumbnailOutcome::Written(_) | ThumbnailOutcome::Skipped => {
                        events.done(0);
                        Ok(Vec::new())
                    }
                }
            }
        }
    }
}
