//! One-call entry points.
//!
//! [`generate`] wires the default network collaborators to a
//! [`Pipeline`] and runs it. Use [`Pipeline`] directly to inject your own
//! collaborators or state store.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::RunReport;
use crate::run::Pipeline;
use crate::services::{Collaborators, GoogleCredentials};
use std::path::Path;
use tracing::info;

/// Produce the script, images, frames, captions and thumbnail for `topic`.
///
/// # Returns
/// `Ok(RunReport)` whenever the run reached the end, even if sentences
/// degraded along the way (check `report.issues`).
///
/// # Errors
/// Returns `Err(PipelineError)` only for fatal errors:
/// - the LLM provider or Google credentials are missing
/// - the state file cannot be read or written
/// - keyword extraction failed under the `Abort` policy
pub async fn generate(
    topic: impl AsRef<str>,
    config: &PipelineConfig,
    google: GoogleCredentials,
) -> Result<RunReport, PipelineError> {
    let topic = topic.as_ref();
    info!("Starting run: {}", topic);
    let collaborators = Collaborators::from_config(config, google)?;
    Pipeline::new(config.clone(), collaborators).run(topic).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    topic: impl AsRef<str>,
    config: &PipelineConfig,
    google: GoogleCredentials,
) -> Result<RunReport, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(topic, config, google))
}

/// Write `report` as pretty JSON to `path`, atomically.
pub async fn write_report(
    report: &RunReport,
    path: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let path = path.as_ref();
    let write_err = |source| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| PipelineError::Internal(format!("Report serialisation failed: {}", e)))?;

    // Atomic write: write to temp, then rename
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
