//! Persistence of the [`Content`] record between stages.
//!
//! The record is rewritten after every stage so an interrupted run can be
//! resumed from the last completed stage. Writes go to a temporary file in
//! the same directory and are renamed over the target: a crash mid-write
//! leaves the previous state intact.

use crate::content::Content;
use crate::error::PipelineError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Loads and saves the state record.
pub trait StateStore: Send + Sync {
    /// The saved record, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<Content>, PipelineError>;

    /// Replace the saved record.
    fn save(&self, content: &Content) -> Result<(), PipelineError>;
}

/// Pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `content.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(crate::output::STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<Content>, PipelineError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PipelineError::StateRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let content = serde_json::from_str(&raw).map_err(|e| PipelineError::StateCorrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        Ok(Some(content))
    }

    fn save(&self, content: &Content) -> Result<(), PipelineError> {
        let write_err = |source| PipelineError::StateWrite {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let json = serde_json::to_string_pretty(content)
            .map_err(|e| PipelineError::Internal(format!("State serialisation failed: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the record in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<Content>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_content(content: Content) -> Self {
        Self {
            inner: Mutex::new(Some(content)),
            saves: Mutex::new(0),
        }
    }

    /// How many times [`StateStore::save`] was called.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }

    /// The last saved record.
    pub fn snapshot(&self) -> Option<Content> {
        self.inner.lock().ok().and_then(|c| c.clone())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<Content>, PipelineError> {
        self.inner
            .lock()
            .map(|c| c.clone())
            .map_err(|_| PipelineError::Internal("state lock poisoned".into()))
    }

    fn save(&self, content: &Content) -> Result<(), PipelineError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| PipelineError::Internal("state lock poisoned".into()))?;
        *inner = Some(content.clone());
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }
}
