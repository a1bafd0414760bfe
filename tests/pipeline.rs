//! Offline integration tests for the full stage sequence.
//!
//! Every collaborator is an in-memory double, so these run without network
//! access or API keys. Frames and captions are rendered at thumbnail sizes
//! to keep the image work fast.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use topic2video::{
    CaptionTemplate, Collaborators, Content, Gravity, ImageFetcher, ImageSearch, JsonStateStore,
    KeywordExtractor, KeywordFailurePolicy, MemoryStateStore, MissingImagePolicy, Pipeline,
    PipelineConfig, PipelineConfigBuilder, PipelineError, PipelineProgressCallback, Sentence,
    ServiceError, SourceText, Stage, StageIssue, StateStore,
};

// ── Test doubles ─────────────────────────────────────────────────────────────

const URL_A: &str = "https://img.example/a.png";
const URL_B: &str = "https://img.example/b.png";

fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 6, image::Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

struct StaticSource {
    text: Result<String, ServiceError>,
    calls: Mutex<usize>,
}

impl StaticSource {
    fn ok(text: &str) -> Self {
        Self {
            text: Ok(text.to_string()),
            calls: Mutex::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            text: Err(ServiceError::NotFound("Test".into())),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SourceText for StaticSource {
    async fn fetch(&self, _topic: &str) -> Result<String, ServiceError> {
        *self.calls.lock().unwrap() += 1;
        self.text.clone()
    }
}

/// First word of the sentence; fails for sentences containing "two".
struct FirstWord {
    fail_on_two: bool,
}

#[async_trait]
impl KeywordExtractor for FirstWord {
    async fn extract(&self, sentence: &str) -> Result<Vec<String>, ServiceError> {
        if self.fail_on_two && sentence.contains("two") {
            return Err(ServiceError::Llm {
                retries: 2,
                detail: "rate limited".into(),
            });
        }
        Ok(sentence
            .split_whitespace()
            .next()
            .map(|w| vec![w.to_string()])
            .unwrap_or_default())
    }
}

/// Returns the same two candidates for every query and records the queries.
#[derive(Default)]
struct SameCandidates {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageSearch for SameCandidates {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<String>, ServiceError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok([URL_A, URL_B]
            .iter()
            .take(count)
            .map(|u| u.to_string())
            .collect())
    }
}

/// Serves a fixed set of URLs; everything else is a 404.
struct MapFetcher {
    bodies: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl MapFetcher {
    fn new(entries: &[(&str, Vec<u8>)]) -> Self {
        Self {
            bodies: entries
                .iter()
                .map(|(url, body)| (url.to_string(), body.clone()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn serving_both() -> Self {
        Self::new(&[(URL_A, png_bytes([200, 0, 0])), (URL_B, png_bytes([0, 0, 200]))])
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| ServiceError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Records every progress event as a short string.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl PipelineProgressCallback for EventLog {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        self.push(format!("start {stage} {total}"));
    }

    fn on_sentence_complete(&self, stage: Stage, index: usize, _total: usize) {
        self.push(format!("done {stage} {index}"));
    }

    fn on_sentence_error(&self, stage: Stage, index: usize, _total: usize, _error: &str) {
        self.push(format!("error {stage} {index}"));
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.push(format!("end {stage}"));
    }

    fn on_run_complete(&self, sentences: usize, issues: usize) {
        self.push(format!("complete {sentences} {issues}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn small_builder(dir: &Path) -> PipelineConfigBuilder {
    init_tracing();
    let tiny = |gravity| CaptionTemplate {
        width: 48,
        height: 24,
        gravity,
    };
    PipelineConfig::builder()
        .max_sentences(2)
        .content_dir(dir)
        .frame_size(32, 18)
        .blur_sigma(1.0)
        .caption_cycle(vec![tiny(Gravity::Center), tiny(Gravity::Center), tiny(Gravity::West)])
}

fn collaborators(
    source: Arc<StaticSource>,
    keywords: FirstWord,
    search: Arc<SameCandidates>,
    fetcher: Arc<MapFetcher>,
) -> Collaborators {
    Collaborators {
        source,
        keywords: Arc::new(keywords),
        search,
        fetcher,
    }
}

fn default_collaborators() -> Collaborators {
    collaborators(
        Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
        FirstWord { fail_on_two: false },
        Arc::new(SameCandidates::default()),
        Arc::new(MapFetcher::serving_both()),
    )
}

/// A record as it looks after the search stage.
fn searched_content() -> Content {
    let mut content = Content::new("Test", 2);
    content.source_content_original = "Sentence one. Sentence two.".into();
    content.source_content_sanitized = "Sentence one. Sentence two.".into();
    content.sentences = ["Sentence one.", "Sentence two."]
        .iter()
        .map(|text| {
            let mut s = Sentence::new(*text);
            s.keywords = vec!["Sentence".into()];
            s.google_search_query = Some("Test Sentence".into());
            s.images = vec![URL_A.into(), URL_B.into()];
            s
        })
        .collect();
    content
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_produces_every_artifact() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path()).build().unwrap();
    let search = Arc::new(SameCandidates::default());
    let fetcher = Arc::new(MapFetcher::serving_both());
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: false },
            search.clone(),
            fetcher.clone(),
        ),
    );

    let report = pipeline.run("Test").await.unwrap();

    assert!(report.issues.is_empty(), "issues: {:?}", report.issues);
    let content = &report.content;
    assert_eq!(content.search_term, "Test");
    assert_eq!(content.maximum_sentences, 2);
    let texts: Vec<_> = content.sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Sentence one.", "Sentence two."]);
    for sentence in &content.sentences {
        assert_eq!(sentence.keywords, vec!["Sentence".to_string()]);
        assert_eq!(sentence.google_search_query.as_deref(), Some("Test Sentence"));
    }
    assert_eq!(
        *search.queries.lock().unwrap(),
        vec!["Test Sentence".to_string(), "Test Sentence".to_string()]
    );

    // Both sentences saw the same candidates; the second one falls back to B.
    let downloaded: Vec<_> = content.downloaded_images.iter().collect();
    assert_eq!(downloaded, vec![URL_A, URL_B]);
    assert_eq!(fetcher.fetched(), vec![URL_A.to_string(), URL_B.to_string()]);

    let layout = pipeline.layout();
    for i in 0..2 {
        assert!(layout.original(i).is_file());
        assert!(layout.caption(i).is_file());
        let frame = image::open(layout.composite(i)).unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 18));
    }
    assert!(layout.thumbnail().is_file());

    let stats = &report.stats;
    assert_eq!(stats.sentences, 2);
    assert_eq!(stats.originals, 2);
    assert_eq!(stats.composites, 2);
    assert_eq!(stats.captions, 2);
    assert!(stats.thumbnail);
    assert_eq!(stats.stages.len(), Stage::ALL.len());

    // The state file holds exactly what the report returned.
    let saved = JsonStateStore::in_dir(dir.path()).load().unwrap().unwrap();
    assert_eq!(&saved, content);
}

#[tokio::test]
async fn source_failure_yields_an_empty_run() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path()).build().unwrap();
    let search = Arc::new(SameCandidates::default());
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::failing()),
            FirstWord { fail_on_two: false },
            search.clone(),
            Arc::new(MapFetcher::serving_both()),
        ),
    );

    let report = pipeline.run("Test").await.unwrap();

    assert!(report.content.sentences.is_empty());
    assert_eq!(report.content.source_content_original, "");
    assert_eq!(report.issues.len(), 1);
    assert!(matches!(report.issues[0], StageIssue::SourceUnavailable { .. }));
    assert!(search.queries.lock().unwrap().is_empty());
    assert!(!pipeline.layout().thumbnail().exists());
    assert!(pipeline.layout().state().is_file());
}

#[tokio::test]
async fn second_topic_does_not_inherit_first_topics_artifacts() {
    let dir = TempDir::new().unwrap();
    let first = Pipeline::new(small_builder(dir.path()).build().unwrap(), default_collaborators());
    let report = first.run("Paris").await.unwrap();
    assert!(report.stats.thumbnail);
    assert!(first.layout().composite(0).is_file());

    // Same directory, new topic, nothing found.
    let second = Pipeline::new(
        small_builder(dir.path()).build().unwrap(),
        collaborators(
            Arc::new(StaticSource::failing()),
            FirstWord { fail_on_two: false },
            Arc::new(SameCandidates::default()),
            Arc::new(MapFetcher::serving_both()),
        ),
    );
    let report = second.run("Nowhere").await.unwrap();

    assert!(report.content.sentences.is_empty());
    assert!(!report.stats.thumbnail);
    assert!(report.artifacts.thumbnail.is_none());
    assert!(!second.layout().thumbnail().exists());
}

#[tokio::test]
async fn rerun_without_pictures_drops_old_frames_and_thumbnail() {
    let dir = TempDir::new().unwrap();
    let first = Pipeline::new(small_builder(dir.path()).build().unwrap(), default_collaborators());
    first.run("Paris").await.unwrap();

    let second = Pipeline::new(
        small_builder(dir.path()).build().unwrap(),
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: false },
            Arc::new(SameCandidates::default()),
            Arc::new(MapFetcher::new(&[])),
        ),
    );
    let report = second.run("Lyon").await.unwrap();

    assert_eq!(report.stats.originals, 0);
    assert_eq!(report.stats.composites, 0);
    assert!(!report.stats.thumbnail);
    for i in 0..2 {
        assert!(!second.layout().original(i).exists());
        assert!(!second.layout().composite(i).exists());
    }
    assert!(!second.layout().thumbnail().exists());
}

#[tokio::test]
async fn config_edited_after_build_is_rejected_by_run() {
    let dir = TempDir::new().unwrap();
    let mut config = small_builder(dir.path()).build().unwrap();
    config.caption_cycle.clear();
    let pipeline = Pipeline::new(config, default_collaborators());

    let err = pipeline.run("Paris").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)), "got: {err}");
    assert!(!pipeline.layout().state().exists());
}

#[tokio::test]
async fn empty_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path()).build().unwrap();
    let pipeline = Pipeline::new(config, default_collaborators());

    let err = pipeline.run("   ").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)), "got: {err}");
}

// ── Keyword failure policies ─────────────────────────────────────────────────

#[tokio::test]
async fn degraded_keywords_fall_back_to_topic_query() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path()).build().unwrap();
    let search = Arc::new(SameCandidates::default());
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: true },
            search.clone(),
            Arc::new(MapFetcher::serving_both()),
        ),
    );

    let report = pipeline.run("Test").await.unwrap();

    assert_eq!(report.issues.len(), 1);
    assert!(matches!(
        report.issues[0],
        StageIssue::KeywordsFailed { sentence: 1, .. }
    ));
    assert!(report.content.sentences[1].keywords.is_empty());
    assert_eq!(
        *search.queries.lock().unwrap(),
        vec!["Test Sentence".to_string(), "Test".to_string()]
    );
    assert_eq!(report.issues_for(1).count(), 1);
    assert_eq!(report.issues_for(0).count(), 0);
}

#[tokio::test]
async fn abort_policy_saves_progress_and_stops() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path())
        .keyword_failure(KeywordFailurePolicy::Abort)
        .build()
        .unwrap();
    let store = Arc::new(MemoryStateStore::new());
    let search = Arc::new(SameCandidates::default());
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: true },
            search.clone(),
            Arc::new(MapFetcher::serving_both()),
        ),
    )
    .with_store(store.clone());

    let err = pipeline.run("Test").await.unwrap_err();

    assert!(
        matches!(err, PipelineError::KeywordExtraction { sentence: 1, .. }),
        "got: {err}"
    );
    let saved = store.snapshot().unwrap();
    assert_eq!(saved.sentences.len(), 2);
    assert_eq!(saved.sentences[0].keywords, vec!["Sentence".to_string()]);
    assert!(saved.sentences[1].keywords.is_empty());
    // Source, sanitize, segment, then the failed keyword stage.
    assert_eq!(store.save_count(), 4);
    assert!(search.queries.lock().unwrap().is_empty());
}

// ── Resuming ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resume_from_download_skips_earlier_stages() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path())
        .resume_from(Stage::Download)
        .build()
        .unwrap();
    let source = Arc::new(StaticSource::ok("Something else entirely."));
    let search = Arc::new(SameCandidates::default());
    let store = Arc::new(MemoryStateStore::with_content(searched_content()));
    let pipeline = Pipeline::new(
        config,
        collaborators(
            source.clone(),
            FirstWord { fail_on_two: false },
            search.clone(),
            Arc::new(MapFetcher::serving_both()),
        ),
    )
    .with_store(store.clone());

    let report = pipeline.run("Test").await.unwrap();

    assert_eq!(source.calls(), 0);
    assert!(search.queries.lock().unwrap().is_empty());
    assert_eq!(report.content.sentences.len(), 2);
    assert_eq!(report.content.downloaded_images.len(), 2);
    assert_eq!(report.stats.composites, 2);
    assert!(report.stats.thumbnail);
    // Download, composite, thumbnail.
    assert_eq!(store.save_count(), 3);
    assert_eq!(
        report.stats.stages.iter().map(|t| t.stage).collect::<Vec<_>>(),
        vec![Stage::Download, Stage::Composite, Stage::Thumbnail]
    );
}

#[tokio::test]
async fn rerun_of_download_reuses_existing_originals() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(MapFetcher::serving_both());
    let store = Arc::new(MemoryStateStore::with_content(searched_content()));
    let build = |fetcher: Arc<MapFetcher>| {
        let config = small_builder(dir.path())
            .resume_from(Stage::Download)
            .build()
            .unwrap();
        Pipeline::new(
            config,
            collaborators(
                Arc::new(StaticSource::ok("unused")),
                FirstWord { fail_on_two: false },
                Arc::new(SameCandidates::default()),
                fetcher,
            ),
        )
        .with_store(store.clone())
    };

    build(fetcher.clone()).run("Test").await.unwrap();
    assert_eq!(fetcher.fetched().len(), 2);

    let report = build(fetcher.clone()).run("Test").await.unwrap();
    assert!(report.issues.is_empty());
    assert_eq!(fetcher.fetched().len(), 2, "second run must not refetch");
    assert_eq!(report.content.downloaded_images.len(), 2);
}

#[tokio::test]
async fn resume_without_state_fails() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path())
        .resume_from(Stage::Keywords)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config, default_collaborators());

    let err = pipeline.run("Test").await.unwrap_err();
    assert!(
        matches!(err, PipelineError::NothingToResume { stage: Stage::Keywords }),
        "got: {err}"
    );
}

#[tokio::test]
async fn resume_with_other_topic_fails() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path())
        .resume_from(Stage::Search)
        .build()
        .unwrap();
    let store = Arc::new(MemoryStateStore::with_content(searched_content()));
    let pipeline = Pipeline::new(config, default_collaborators()).with_store(store.clone());

    let err = pipeline.run("Paris").await.unwrap_err();
    match err {
        PipelineError::TopicMismatch { saved, requested } => {
            assert_eq!(saved, "Test");
            assert_eq!(requested, "Paris");
        }
        other => panic!("expected TopicMismatch, got {other}"),
    }
    assert_eq!(store.save_count(), 0);
}

// ── Missing images ───────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_candidates_skip_frames_and_thumbnail() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path()).build().unwrap();
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: false },
            Arc::new(SameCandidates::default()),
            Arc::new(MapFetcher::new(&[(URL_B, b"<html>blocked</html>".to_vec())])),
        ),
    );

    let report = pipeline.run("Test").await.unwrap();

    let exhausted: Vec<_> = report
        .issues
        .iter()
        .filter_map(|i| match i {
            StageIssue::CandidatesExhausted { sentence, .. } => Some(*sentence),
            _ => None,
        })
        .collect();
    assert_eq!(exhausted, vec![0, 1]);
    assert!(report.content.downloaded_images.is_empty());
    assert_eq!(report.stats.composites, 0);
    assert_eq!(report.stats.captions, 2);
    assert!(!report.stats.thumbnail);
}

#[tokio::test]
async fn placeholder_policy_keeps_every_frame() {
    let dir = TempDir::new().unwrap();
    let config = small_builder(dir.path())
        .missing_image(MissingImagePolicy::Placeholder)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(
        config,
        collaborators(
            Arc::new(StaticSource::ok("Sentence one. Sentence two.")),
            FirstWord { fail_on_two: false },
            Arc::new(SameCandidates::default()),
            Arc::new(MapFetcher::new(&[(URL_A, png_bytes([0, 200, 0]))])),
        ),
    );

    let report = pipeline.run("Test").await.unwrap();

    assert_eq!(report.stats.originals, 1);
    assert_eq!(report.stats.composites, 2);
    assert!(report.stats.thumbnail);
    let frame = image::open(pipeline.layout().composite(1)).unwrap().to_rgba8();
    assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 255]));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_follow_the_stages() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(EventLog::default());
    let config = small_builder(dir.path())
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config, default_collaborators());

    pipeline.run("Test").await.unwrap();
    let events = log.events();

    let starts: Vec<_> = events.iter().filter(|e| e.starts_with("start ")).collect();
    assert_eq!(
        starts,
        vec![
            "start source 1",
            "start sanitize 1",
            "start segment 1",
            "start keywords 2",
            "start search 2",
            "start download 2",
            "start composite 4",
            "start thumbnail 1",
        ]
    );
    let ends = events.iter().filter(|e| e.starts_with("end ")).count();
    assert_eq!(ends, Stage::ALL.len());

    // Every stage fills its bar: one event per announced unit.
    for stage in Stage::ALL {
        let announced = events
            .iter()
            .find_map(|e| e.strip_prefix(&format!("start {stage} ")))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap();
        let (done, error) = (format!("done {stage} "), format!("error {stage} "));
        let reported = events
            .iter()
            .filter(|e| e.starts_with(&done) || e.starts_with(&error))
            .count();
        assert_eq!(reported, announced, "stage {stage}");
    }
    assert!(events.contains(&"done source 0".to_string()));
    assert!(events.contains(&"done thumbnail 0".to_string()));
    assert!(events.contains(&"done download 1".to_string()));
    assert_eq!(
        events.iter().filter(|e| *e == "done composite 0").count(),
        2,
        "frame and caption each report once"
    );
    assert!(!events.iter().any(|e| e.starts_with("error ")));
    assert_eq!(events.last().map(String::as_str), Some("complete 2 0"));
}
