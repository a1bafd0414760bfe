//! CLI binary for topic2video.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use topic2video::{
    generate, write_report, GoogleCredentials, KeywordFailurePolicy, MissingImagePolicy,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, RunReport, Stage,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar, re-armed at the start of each stage,
/// plus a log line per failed sentence and per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn stage_elapsed(&self) -> f64 {
        self.stage_started
            .lock()
            .ok()
            .and_then(|started| started.map(|t| t.elapsed().as_secs_f64()))
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>10}  \
             [{bar:42.green/238}] {pos:>3}/{len}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.reset();
        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_prefix(stage.to_string());
    }

    fn on_sentence_complete(&self, _stage: Stage, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_sentence_error(&self, stage: Stage, index: usize, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<10} sentence {:>2}  {}",
            red("✗"),
            stage,
            index,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage,
            dim(&format!("{:.1}s", self.stage_elapsed())),
        ));
    }

    fn on_run_complete(&self, sentences: usize, issues: usize) {
        self.bar.finish_and_clear();
        if issues == 0 {
            eprintln!(
                "{} {} sentences produced without issues",
                green("✔"),
                bold(&sentences.to_string())
            );
        } else {
            eprintln!(
                "{} {} sentences produced  ({} issues)",
                cyan("⚠"),
                bold(&sentences.to_string()),
                red(&issues.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five sentences about Paris into ./content
  topic2video "Paris" --max-sentences 5

  # Portuguese Wikipedia, separate output directory
  topic2video "Brasília" --language pt --content-dir out/brasilia

  # Re-render frames and captions only, reusing the saved state
  topic2video "Paris" --resume-from composite

  # Black frames for sentences without a picture
  topic2video "Paris" --missing-image placeholder

  # Machine-readable report
  topic2video "Paris" --json > report.json

STAGES (for --resume-from):
  source, sanitize, segment, keywords, search, download, composite, thumbnail

OUTPUT FILES (in --content-dir):
  content.json              state, rewritten after every stage
  <i>-original.png          downloaded picture for sentence i
  <i>-composite.png         1920x1080 blur-fill background frame
  <i>-sentence.png          transparent caption overlay
  youtube-thumbnail.jpg     first frame as JPEG

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Google Custom Search API key
  SEARCH_ENGINE_ID        Programmable Search Engine ID (image search enabled)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Turn a topic into script, pictures, frames, captions and a thumbnail.
#[derive(Parser, Debug)]
#[command(
    name = "topic2video",
    version,
    about = "Turn a topic into the raw assets of a short narrated video",
    long_about = "Fetch a topic's Wikipedia introduction, split it into sentences, find one \
picture per sentence and render 1920x1080 background frames, caption overlays and a thumbnail.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Topic to look up (a Wikipedia article title).
    topic: String,

    /// Maximum number of sentences in the script.
    #[arg(short = 'n', long, env = "TOPIC2VIDEO_MAX_SENTENCES", default_value_t = 7)]
    max_sentences: usize,

    /// Directory for content.json and all images.
    #[arg(short = 'o', long, env = "TOPIC2VIDEO_CONTENT_DIR", default_value = "content")]
    content_dir: PathBuf,

    /// Wikipedia language edition.
    #[arg(long, env = "TOPIC2VIDEO_LANGUAGE", default_value = "en")]
    language: String,

    /// Image candidates requested per sentence (1–10).
    #[arg(long, env = "TOPIC2VIDEO_IMAGES_PER_QUERY", default_value_t = 2,
          value_parser = clap::value_parser!(u8).range(1..=10))]
    images_per_query: u8,

    /// Skip the stages before this one, continuing from the saved state.
    #[arg(long)]
    resume_from: Option<Stage>,

    /// What to render for a sentence without a picture.
    #[arg(long, env = "TOPIC2VIDEO_MISSING_IMAGE", value_enum, default_value = "skip")]
    missing_image: MissingImageArg,

    /// What to do when keyword extraction fails for a sentence.
    #[arg(long, env = "TOPIC2VIDEO_ON_KEYWORD_ERROR", value_enum, default_value = "degrade")]
    on_keyword_error: KeywordErrorArg,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-haiku-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Retries per keyword request on LLM failure.
    #[arg(long, env = "TOPIC2VIDEO_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Google Custom Search API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Programmable Search Engine ID.
    #[arg(long, env = "SEARCH_ENGINE_ID")]
    search_engine_id: Option<String>,

    /// Gaussian blur sigma for the background fill.
    #[arg(long, env = "TOPIC2VIDEO_BLUR", default_value_t = 9.0)]
    blur: f32,

    /// JPEG quality of the thumbnail (1–100).
    #[arg(long, env = "TOPIC2VIDEO_THUMBNAIL_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    thumbnail_quality: u8,

    /// Image download timeout in seconds.
    #[arg(long, env = "TOPIC2VIDEO_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Search and LLM call timeout in seconds.
    #[arg(long, env = "TOPIC2VIDEO_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Also write the run report as JSON to this file.
    #[arg(long, env = "TOPIC2VIDEO_REPORT")]
    report: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "TOPIC2VIDEO_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TOPIC2VIDEO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TOPIC2VIDEO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TOPIC2VIDEO_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum MissingImageArg {
    Skip,
    Placeholder,
}

impl From<MissingImageArg> for MissingImagePolicy {
    fn from(v: MissingImageArg) -> Self {
        match v {
            MissingImageArg::Skip => MissingImagePolicy::Skip,
            MissingImageArg::Placeholder => MissingImagePolicy::Placeholder,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum KeywordErrorArg {
    Degrade,
    Abort,
}

impl From<KeywordErrorArg> for KeywordFailurePolicy {
    fn from(v: KeywordErrorArg) -> Self {
        match v {
            KeywordErrorArg::Degrade => KeywordFailurePolicy::Degrade,
            KeywordErrorArg::Abort => KeywordFailurePolicy::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let google = GoogleCredentials {
        api_key: cli.google_api_key.clone().unwrap_or_default(),
        search_engine_id: cli.search_engine_id.clone().unwrap_or_default(),
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let report = generate(&cli.topic, &config, google)
        .await
        .with_context(|| format!("Run for '{}' failed", cli.topic))?;

    if let Some(ref path) = cli.report {
        write_report(&report, path)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &cli.content_dir);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_sentences(cli.max_sentences)
        .content_dir(&cli.content_dir)
        .language(&cli.language)
        .images_per_query(usize::from(cli.images_per_query))
        .blur_sigma(cli.blur)
        .thumbnail_quality(cli.thumbnail_quality)
        .missing_image(cli.missing_image.clone().into())
        .keyword_failure(cli.on_keyword_error.clone().into())
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(stage) = cli.resume_from {
        builder = builder.resume_from(stage);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable result on stdout.
fn print_summary(report: &RunReport, content_dir: &std::path::Path) {
    for (i, sentence) in report.content.sentences.iter().enumerate() {
        let artifacts = report.artifacts.get(i);
        let has_frame = artifacts.map(|a| a.composite.is_some()).unwrap_or(false);
        println!(
            "{} {:>2}  {}",
            if has_frame { green("■") } else { red("□") },
            i,
            sentence.text
        );
        if !sentence.keywords.is_empty() {
            println!("      {}", dim(&sentence.keywords.join(", ")));
        }
    }

    for issue in &report.issues {
        eprintln!("  {} {}", cyan("⚠"), issue);
    }

    let stats = &report.stats;
    eprintln!(
        "{}  {} sentences  {} pictures  {} frames  {} captions  thumbnail {}  {}ms  →  {}",
        if stats.issues == 0 { green("✔") } else { cyan("⚠") },
        stats.sentences,
        stats.originals,
        stats.composites,
        stats.captions,
        if stats.thumbnail { "yes" } else { "no" },
        stats.total_duration_ms,
        bold(&content_dir.display().to_string()),
    );
}
