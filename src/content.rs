//! The run's shared state: [`Content`] and its [`Sentence`]s.
//!
//! One `Content` exists per run. Every stage receives it by `&mut` and fills
//! in its part; nothing else owns a copy. The serialised field names are
//! camelCase so a `content.json` written by earlier tooling loads unchanged.

use serde::{Deserialize, Serialize};

/// Aggregate root for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// User-supplied topic. Never changes after creation.
    pub search_term: String,

    /// Hard cap applied by the segmentation stage.
    pub maximum_sentences: usize,

    /// Raw text returned by the source lookup.
    #[serde(default)]
    pub source_content_original: String,

    /// `source_content_original` after blank-line, markdown and parenthesis removal.
    #[serde(default)]
    pub source_content_sanitized: String,

    /// Script sentences in narration order.
    #[serde(default)]
    pub sentences: Vec<Sentence>,

    /// Every image URL downloaded so far in this run.
    #[serde(default)]
    pub downloaded_images: DownloadedImages,
}

impl Content {
    /// Fresh state for `search_term`, nothing fetched yet.
    pub fn new(search_term: impl Into<String>, maximum_sentences: usize) -> Self {
        Self {
            search_term: search_term.into(),
            maximum_sentences,
            source_content_original: String::new(),
            source_content_sanitized: String::new(),
            sentences: Vec::new(),
            downloaded_images: DownloadedImages::default(),
        }
    }
}

/// One narration sentence and the data attached to it by later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub text: String,

    /// Extracted keywords; only the first one feeds the image query.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Candidate image URLs, best match first.
    #[serde(default)]
    pub images: Vec<String>,

    /// The exact query sent to the image search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_search_query: Option<String>,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keywords: Vec::new(),
            images: Vec::new(),
            google_search_query: None,
        }
    }

    /// The keyword used to narrow the image search, if any.
    pub fn primary_keyword(&self) -> Option<&str> {
        self.keywords
            .first()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
    }
}

/// Run-wide set of successfully downloaded image URLs.
///
/// Insertion order is kept so the serialised form is stable. The set only
/// grows: there is no removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DownloadedImages(Vec<String>);

impl DownloadedImages {
    /// Whether `url` has already been downloaded for some sentence.
    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|u| u == url)
    }

    /// Record `url`. Returns `false` (and changes nothing) if it was present.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.contains(&url) {
            return false;
        }
        self.0.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// State files written by other tools may repeat a URL; loading keeps the
/// first occurrence so the uniqueness invariant holds from the start.
impl<'de> Deserialize<'de> for DownloadedImages {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let urls = Vec::<String>::deserialize(deserializer)?;
        Ok(urls.into_iter().collect())
    }
}

impl FromIterator<String> for DownloadedImages {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = DownloadedImages::default();
        for url in iter {
            set.insert(url);
        }
        set
    }
}
