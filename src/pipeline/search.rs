//! Image search stage.
//!
//! One query per sentence: the topic plus the sentence's first keyword, or
//! the topic alone when the sentence has none. Results keep the search
//! engine's order, which is the order the resolver tries them in.

use super::StageEvents;
use crate::content::{Content, Sentence};
use crate::error::StageIssue;
use crate::services::ImageSearch;
use tracing::{debug, warn};

/// The query for one sentence.
pub fn build_query(search_term: &str, sentence: &Sentence) -> String {
    let term = search_term.trim();
    match sentence.primary_keyword() {
        Some(keyword) => format!("{} {}", term, keyword),
        None => term.to_string(),
    }
}

/// Fill `google_search_query` and `images` for every sentence.
///
/// A failed search leaves the sentence with no candidates and records a
/// [`StageIssue::SearchFailed`].
pub async fn search_images(
    content: &mut Content,
    search: &dyn ImageSearch,
    images_per_query: usize,
    events: &StageEvents<'_>,
) -> Vec<StageIssue> {
    let mut issues = Vec::new();
    let search_term = content.search_term.clone();

    for (index, sentence) in content.sentences.iter_mut().enumerate() {
        let query = build_query(&search_term, sentence);
        sentence.google_search_query = Some(query.clone());

        match search.search(&query, images_per_query).await {
            Ok(mut urls) => {
                urls.truncate(images_per_query);
                debug!("Sentence {}: '{}' → {} candidates", index, query, urls.len());
                sentence.images = urls;
                events.done(index);
            }
            Err(e) => {
                warn!("Sentence {}: image search '{}' failed: {}", index, query, e);
                sentence.images.clear();
                let issue = StageIssue::SearchFailed {
                    sentence: index,
                    detail: e.to_string(),
                };
                events.failed(index, &issue);
                issues.push(issue);
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::run::Stage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageSearch for Recording {
        async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, ServiceError> {
            self.queries.lock().unwrap().push(query.to_string());
            if query.contains("broken") {
                return Err(ServiceError::Http {
                    url: "https://search.example".into(),
                    status: 429,
                });
            }
            Ok((0..count + 3)
                .map(|i| format!("https://img.example/{}/{}.jpg", query.len(), i))
                .collect())
        }
    }

    fn sentence(keywords: &[&str]) -> Sentence {
        let mut s = Sentence::new("x");
        s.keywords = keywords.iter().map(|k| k.to_string()).collect();
        s
    }

    #[test]
    fn query_with_and_without_keyword() {
        assert_eq!(
            build_query("Paris", &sentence(&["Eiffel Tower", "Seine"])),
            "Paris Eiffel Tower"
        );
        assert_eq!(build_query("Paris", &sentence(&[])), "Paris");
        assert_eq!(build_query(" Paris ", &sentence(&["  ", "Seine"])), "Paris");
    }

    #[tokio::test]
    async fn fills_queries_and_truncates_results() {
        let mut content = Content::new("Paris", 7);
        content.sentences = vec![sentence(&["Louvre"]), sentence(&[])];
        let search = Recording {
            queries: Mutex::new(Vec::new()),
        };
        let issues = search_images(
            &mut content,
            &search,
            2,
            &StageEvents::silent(Stage::Search, 2),
        )
        .await;

        assert!(issues.is_empty());
        assert_eq!(
            *search.queries.lock().unwrap(),
            vec!["Paris Louvre".to_string(), "Paris".to_string()]
        );
        assert_eq!(content.sentences[0].google_search_query.as_deref(), Some("Paris Louvre"));
        assert_eq!(content.sentences[0].images.len(), 2);
        assert_eq!(content.sentences[1].images.len(), 2);
    }

    #[tokio::test]
    async fn failure_yields_empty_candidates() {
        let mut content = Content::new("Paris", 7);
        content.sentences = vec![sentence(&["broken"]), sentence(&["Seine"])];
        content.sentences[0].images = vec!["stale".into()];
        let search = Recording {
            queries: Mutex::new(Vec::new()),
        };
        let issues = search_images(
            &mut content,
            &search,
            2,
            &StageEvents::silent(Stage::Search, 2),
        )
        .await;

        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], StageIssue::SearchFailed { sentence: 0, .. }));
        assert!(content.sentences[0].images.is_empty());
        assert_eq!(content.sentences[0].google_search_query.as_deref(), Some("Paris broken"));
        assert_eq!(content.sentences[1].images.len(), 2);
    }
}
