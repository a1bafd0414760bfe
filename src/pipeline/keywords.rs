//! Keyword extraction stage.
//!
//! Sentences are processed one at a time, in order. A failure either
//! degrades the sentence (empty keywords, an issue in the report) or stops
//! the run, depending on [`KeywordFailurePolicy`].

use super::StageEvents;
use crate::config::KeywordFailurePolicy;
use crate::content::Content;
use crate::error::{PipelineError, StageIssue};
use crate::services::KeywordExtractor;
use tracing::{debug, warn};

/// Fill `keywords` for every sentence in `content`.
///
/// Under [`KeywordFailurePolicy::Abort`] the first failure is returned as
/// [`PipelineError::KeywordExtraction`]; sentences already processed keep
/// their keywords so the caller can persist them.
pub async fn extract_keywords(
    content: &mut Content,
    extractor: &dyn KeywordExtractor,
    policy: KeywordFailurePolicy,
    events: &StageEvents<'_>,
) -> Result<Vec<StageIssue>, PipelineError> {
    let mut issues = Vec::new();

    for (index, sentence) in content.sentences.iter_mut().enumerate() {
        match extractor.extract(&sentence.text).await {
            Ok(keywords) => {
                debug!("Sentence {}: keywords {:?}", index, keywords);
                sentence.keywords = keywords;
                events.done(index);
            }
            Err(e) => {
                sentence.keywords.clear();
                if policy == KeywordFailurePolicy::Abort {
                    return Err(PipelineError::KeywordExtraction {
                        sentence: index,
                        detail: e.to_string(),
                    });
                }
                warn!("Sentence {}: keyword extraction failed: {}", index, e);
                let issue = StageIssue::KeywordsFailed {
                    sentence: index,
                    detail: e.to_string(),
                };
                events.failed(index, &issue);
                issues.push(issue);
            }
        }
    }

    Ok(issues)
}
