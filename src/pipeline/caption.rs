//! Caption overlays: white sentence text on a transparent canvas.
//!
//! The caption is laid out as an SVG document and rasterised with resvg.
//! Layout is approximate: glyph widths are estimated at
//! [`CHAR_WIDTH_EM`] of the font size, which is close enough for bold
//! sans-serif faces to keep the text inside the canvas. The largest font
//! size whose wrapped block fits the canvas is chosen.
//!
//! The font database is loaded once per [`CaptionRenderer`]. Loading system
//! fonts takes a noticeable fraction of a second, so a renderer should be
//! shared across all captions of a run.

use super::{blocking, remove_stale, StageEvents};
use crate::config::{CaptionTemplate, Gravity, PipelineConfig};
use crate::content::Content;
use crate::error::{PipelineError, StageIssue};
use crate::output::ArtifactLayout;
use image::{ImageFormat, Rgba, RgbaImage};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Estimated advance of one character, in ems.
pub const CHAR_WIDTH_EM: f32 = 0.55;

const LINE_HEIGHT_EM: f32 = 1.25;
const MAX_FONT_PX: u32 = 96;
const MIN_FONT_PX: u32 = 16;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption SVG rejected: {0}")]
    Svg(String),

    #[error("cannot allocate a {width}x{height} caption canvas")]
    Allocation { width: u32, height: u32 },

    #[error("caption encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Where and how big the caption text goes.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_size: u32,
    pub lines: Vec<String>,
    /// Anchor x of every line.
    pub x: f32,
    /// Baseline y of each line.
    pub baselines: Vec<f32>,
    pub gravity: Gravity,
}

/// Word-wrap `text` greedily at `max_chars` characters per line.
///
/// A word longer than the limit gets a line of its own.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Pick the font size and line positions for `text` inside `template`.
pub fn layout_caption(text: &str, template: CaptionTemplate) -> CaptionLayout {
    let (w, h) = (template.width as f32, template.height as f32);
    let padding = (w.min(h) * 0.06).max(16.0);
    let usable_w = (w - 2.0 * padding).max(1.0);
    let usable_h = (h - 2.0 * padding).max(1.0);

    let fits = |size: u32| {
        let size_f = size as f32;
        let max_chars = (usable_w / (size_f * CHAR_WIDTH_EM)).floor() as usize;
        let lines = wrap_text(text, max_chars);
        let block = lines.len() as f32 * size_f * LINE_HEIGHT_EM;
        (block <= usable_h, lines)
    };

    let mut chosen = None;
    let mut size = MAX_FONT_PX;
    while size >= MIN_FONT_PX {
        let (ok, lines) = fits(size);
        if ok {
            chosen = Some((size, lines));
            break;
        }
        size -= 2;
    }
    // Too long for the canvas even at the smallest size: overflow rather than vanish.
    let (font_size, lines) = chosen.unwrap_or_else(|| (MIN_FONT_PX, fits(MIN_FONT_PX).1));

    let size_f = font_size as f32;
    let line_height = size_f * LINE_HEIGHT_EM;
    let block = lines.len() as f32 * line_height;
    let top = padding + (usable_h - block) / 2.0;
    // Cap height sits roughly 0.8 em above the baseline.
    let first_baseline = top + (line_height - size_f) / 2.0 + size_f * 0.8;
    let baselines = (0..lines.len())
        .map(|i| first_baseline + i as f32 * line_height)
        .collect();

    let x = match template.gravity {
        Gravity::Center => w / 2.0,
        Gravity::West => padding,
    };

    CaptionLayout {
        font_size,
        lines,
        x,
        baselines,
        gravity: template.gravity,
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// The caption as a standalone SVG document.
pub fn caption_svg(text: &str, template: CaptionTemplate, font_family: &str) -> String {
    let layout = layout_caption(text, template);
    let anchor = match layout.gravity {
        Gravity::Center => "middle",
        Gravity::West => "start",
    };

    let mut tspans = String::new();
    for (line, y) in layout.lines.iter().zip(&layout.baselines) {
        let _ = write!(
            tspans,
            r#"<tspan x="{:.1}" y="{:.1}">{}</tspan>"#,
            layout.x,
            y,
            escape_xml(line)
        );
    }

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" "#,
            r#"viewBox="0 0 {w} {h}">"#,
            r#"<text font-family="{family}" font-size="{size}" font-weight="bold" "#,
            r##"fill="#ffffff" text-anchor="{anchor}">{tspans}</text></svg>"##,
        ),
        w = template.width,
        h = template.height,
        family = escape_xml(font_family),
        size = layout.font_size,
        anchor = anchor,
        tspans = tspans,
    )
}

/// Rasterises captions against one shared font database.
pub struct CaptionRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
    font_family: String,
}

impl CaptionRenderer {
    /// Load the system fonts.
    pub fn new(font_family: impl Into<String>) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Self::with_fontdb(Arc::new(db), font_family)
    }

    /// Use an existing font database.
    pub fn with_fontdb(
        fontdb: Arc<usvg::fontdb::Database>,
        font_family: impl Into<String>,
    ) -> Self {
        Self {
            fontdb,
            font_family: font_family.into(),
        }
    }

    /// Number of font faces available. With zero faces captions render empty.
    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Render `text` onto a transparent `template`-sized canvas.
    pub fn render(&self, text: &str, template: CaptionTemplate) -> Result<RgbaImage, CaptionError> {
        let svg = caption_svg(text, template, &self.font_family);
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree =
            usvg::Tree::from_str(&svg, &opts).map_err(|e| CaptionError::Svg(e.to_string()))?;

        let (width, height) = (template.width, template.height);
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or(CaptionError::Allocation { width, height })?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        let mut image = RgbaImage::new(width, height);
        for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(image)
    }
}

/// Produce `<i>-sentence.png` for every sentence, cycling through the templates.
pub async fn render_captions(
    content: &Content,
    config: &PipelineConfig,
    layout: &ArtifactLayout,
    events: &StageEvents<'_>,
) -> Result<Vec<StageIssue>, PipelineError> {
    let mut issues = Vec::new();
    if content.sentences.is_empty() {
        return Ok(issues);
    }

    let family = config.caption_font_family.clone();
    let renderer = Arc::new(blocking(move || CaptionRenderer::new(family)).await?);
    info!("Caption fonts loaded: {} faces", renderer.face_count());
    if renderer.face_count() == 0 {
        warn!("No system fonts found; captions will be blank");
    }

    for (index, sentence) in content.sentences.iter().enumerate() {
        let template = config.caption_template(index);
        let dst = layout.caption(index);
        let text = sentence.text.clone();
        let (r, d) = (Arc::clone(&renderer), dst.clone());

        let result = blocking(move || -> Result<(), CaptionError> {
            let image = r.render(&text, template)?;
            image.save_with_format(&d, ImageFormat::Png)?;
            Ok(())
        })
        .await?;

        match result {
            Ok(()) => {
                debug!(
                    "Sentence {}: caption {}x{} → {}",
                    index,
                    template.width,
                    template.height,
                    dst.display()
                );
                events.done(index);
            }
            Err(e) => {
                warn!("Sentence {}: caption failed: {}", index, e);
                remove_stale(&dst).await;
                let issue = StageIssue::ProcessingFailed {
                    sentence: Some(index),
                    path: dst,
                    detail: e.to_string(),
                };
                events.failed(index, &issue);
                issues.push(issue);
            }
        }
    }

    Ok(issues)
}
