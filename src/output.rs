//! Output types: where artifacts live on disk and what a run reports.

use crate::content::Content;
use crate::error::StageIssue;
use crate::run::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the persisted state inside the content directory.
pub const STATE_FILE: &str = "content.json";

/// File name of the thumbnail inside the content directory.
pub const THUMBNAIL_FILE: &str = "youtube-thumbnail.jpg";

/// The per-sentence artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Downloaded candidate, saved under a `.png` name whatever its real format.
    Original,
    /// Background frame at the target resolution.
    Composite,
    /// Transparent caption overlay.
    Caption,
}

impl ArtifactKind {
    fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Original => "original.png",
            ArtifactKind::Composite => "composite.png",
            ArtifactKind::Caption => "sentence.png",
        }
    }
}

/// Deterministic artifact paths inside the content directory.
///
/// Names depend only on the sentence index so reruns overwrite in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<index>-<kind suffix>`.
    pub fn path(&self, index: usize, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}-{}", index, kind.suffix()))
    }

    pub fn original(&self, index: usize) -> PathBuf {
        self.path(index, ArtifactKind::Original)
    }

    pub fn composite(&self, index: usize) -> PathBuf {
        self.path(index, ArtifactKind::Composite)
    }

    pub fn caption(&self, index: usize) -> PathBuf {
        self.path(index, ArtifactKind::Caption)
    }

    pub fn thumbnail(&self) -> PathBuf {
        self.dir.join(THUMBNAIL_FILE)
    }

    pub fn state(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }
}

/// The files that exist for one sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceArtifacts {
    pub original: Option<PathBuf>,
    pub composite: Option<PathBuf>,
    pub caption: Option<PathBuf>,
}

/// Artifacts by sentence index, plus the thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub sentences: BTreeMap<usize, SentenceArtifacts>,
    pub thumbnail: Option<PathBuf>,
}

impl ArtifactIndex {
    /// Collect whatever exists on disk for sentences `0..sentence_count`.
    pub fn scan(layout: &ArtifactLayout, sentence_count: usize) -> Self {
        let existing = |p: PathBuf| if p.is_file() { Some(p) } else { None };
        let sentences = (0..sentence_count)
            .map(|i| {
                (
                    i,
                    SentenceArtifacts {
                        original: existing(layout.original(i)),
                        composite: existing(layout.composite(i)),
                        caption: existing(layout.caption(i)),
                    },
                )
            })
            .collect();
        Self {
            sentences,
            thumbnail: existing(layout.thumbnail()),
        }
    }

    pub fn get(&self, index: usize) -> Option<&SentenceArtifacts> {
        self.sentences.get(&index)
    }

    fn count(&self, pick: impl Fn(&SentenceArtifacts) -> bool) -> usize {
        self.sentences.values().filter(|a| pick(a)).count()
    }
}

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Sentences in the script.
    pub sentences: usize,
    /// Sentences with at least one keyword.
    pub sentences_with_keywords: usize,
    /// Sentences with at least one image candidate.
    pub sentences_with_candidates: usize,
    /// Original images on disk.
    pub originals: usize,
    /// Composite frames on disk.
    pub composites: usize,
    /// Caption overlays on disk.
    pub captions: usize,
    /// Whether the thumbnail exists.
    pub thumbnail: bool,
    /// Non-fatal issues recorded during the run.
    pub issues: usize,
    /// Stages executed, in order.
    pub stages: Vec<StageTiming>,
    /// Total wall-clock time.
    pub total_duration_ms: u64,
}

impl RunStats {
    pub(crate) fn collect(
        content: &Content,
        artifacts: &ArtifactIndex,
        issues: &[StageIssue],
        stages: Vec<StageTiming>,
        total_duration_ms: u64,
    ) -> Self {
        Self {
            sentences: content.sentences.len(),
            sentences_with_keywords: content
                .sentences
                .iter()
                .filter(|s| !s.keywords.is_empty())
                .count(),
            sentences_with_candidates: content
                .sentences
                .iter()
                .filter(|s| !s.images.is_empty())
                .count(),
            originals: artifacts.count(|a| a.original.is_some()),
            composites: artifacts.count(|a| a.composite.is_some()),
            captions: artifacts.count(|a| a.caption.is_some()),
            thumbnail: artifacts.thumbnail.is_some(),
            issues: issues.len(),
            stages,
            total_duration_ms,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The final persisted state.
    pub content: Content,
    /// Files on disk, by sentence index.
    pub artifacts: ArtifactIndex,
    /// Non-fatal issues in the order they happened.
    pub issues: Vec<StageIssue>,
    pub stats: RunStats,
}

impl RunReport {
    /// Issues recorded for one sentence.
    pub fn issues_for(&self, index: usize) -> impl Iterator<Item = &StageIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.sentence() == Some(index))
    }
}
