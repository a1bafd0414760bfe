//! Background frames and the thumbnail.
//!
//! ## Frame geometry
//!
//! Every frame is exactly `frame_width × frame_height` whatever the source
//! aspect ratio, and has no letterbox bars:
//!
//! 1. **Background**: the original is blurred, scaled to *cover* the frame
//!    and centre-cropped.
//! 2. **Foreground**: the unblurred original is scaled to *fit* inside the
//!    frame, aspect ratio kept, and centred on top.
//!
//! Blurring happens before scaling so the blur strength is relative to the
//! source picture, not the output frame.
//!
//! Decoding, resampling and encoding are CPU-bound and run in
//! `spawn_blocking` so the Tokio workers keep serving network stages.

use super::{blocking, remove_stale, StageEvents};
use crate::config::{MissingImagePolicy, PipelineConfig};
use crate::content::Content;
use crate::error::{PipelineError, StageIssue};
use crate::output::ArtifactLayout;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Blur-fill `original` into a `width × height` frame.
pub fn compose_background(
    original: &DynamicImage,
    width: u32,
    height: u32,
    blur_sigma: f32,
) -> RgbaImage {
    let rgba = original.to_rgba8();
    let blurred = if blur_sigma > 0.0 {
        imageops::fast_blur(&rgba, blur_sigma)
    } else {
        rgba
    };

    let background = DynamicImage::ImageRgba8(blurred)
        .resize_to_fill(width, height, FilterType::Triangle)
        .to_rgba8();
    let foreground = original.resize(width, height, FilterType::Lanczos3).to_rgba8();

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    imageops::overlay(
        &mut canvas,
        &background,
        centred(width, background.width()),
        centred(height, background.height()),
    );
    imageops::overlay(
        &mut canvas,
        &foreground,
        centred(width, foreground.width()),
        centred(height, foreground.height()),
    );
    canvas
}

/// Offset that centres `inner` inside `outer`.
fn centred(outer: u32, inner: u32) -> i64 {
    (i64::from(outer) - i64::from(inner)) / 2
}

/// A solid black frame for sentences without an image.
pub fn placeholder_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}

/// Decode an image file, sniffing the format from its bytes.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImageError> {
    let bytes = std::fs::read(path)?;
    image::load_from_memory(&bytes)
}

/// JPEG-encode a frame. Alpha is dropped.
pub fn encode_thumbnail(frame: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = frame.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

fn compose_file(
    src: &Path,
    dst: &Path,
    width: u32,
    height: u32,
    blur_sigma: f32,
) -> Result<(), ImageError> {
    let original = load_image(src)?;
    debug!(
        "Compositing {} ({}x{}) → {}",
        src.display(),
        original.width(),
        original.height(),
        dst.display()
    );
    compose_background(&original, width, height, blur_sigma)
        .save_with_format(dst, ImageFormat::Png)
}

/// Produce `<i>-composite.png` for every sentence.
///
/// A sentence without an original gets a black frame under
/// [`MissingImagePolicy::Placeholder`] and nothing under
/// [`MissingImagePolicy::Skip`]. Whenever no frame is written for an index,
/// a frame left there by an earlier run is removed.
pub async fn render_frames(
    content: &Content,
    config: &PipelineConfig,
    layout: &ArtifactLayout,
    events: &StageEvents<'_>,
) -> Result<Vec<StageIssue>, PipelineError> {
    let (width, height, sigma) = (config.frame_width, config.frame_height, config.blur_sigma);
    let mut issues = Vec::new();

    for index in 0..content.sentences.len() {
        let src = layout.original(index);
        let dst = layout.composite(index);

        let result = if src.is_file() {
            let (s, d) = (src.clone(), dst.clone());
            blocking(move || compose_file(&s, &d, width, height, sigma)).await?
        } else {
            match config.missing_image {
                MissingImagePolicy::Skip => {
                    debug!("Sentence {}: no original, skipping frame", index);
                    remove_stale(&dst).await;
                    continue;
                }
                MissingImagePolicy::Placeholder => {
                    debug!("Sentence {}: no original, writing placeholder", index);
                    let d = dst.clone();
                    blocking(move || {
                        placeholder_frame(width, height).save_with_format(&d, ImageFormat::Png)
                    })
                    .await?
                }
            }
        };

        match result {
            Ok(()) => events.done(index),
            Err(e) => {
                warn!("Sentence {}: frame failed: {}", index, e);
                remove_stale(&dst).await;
                let issue = StageIssue::ProcessingFailed {
                    sentence: Some(index),
                    path: src,
                    detail: e.to_string(),
                };
                events.failed(index, &issue);
                issues.push(issue);
            }
        }
    }

    Ok(issues)
}

/// What the thumbnail step did.
#[derive(Debug, PartialEq)]
pub enum ThumbnailOutcome {
    Written(PathBuf),
    /// There is no first frame to encode.
    Skipped,
    Failed(StageIssue),
}

/// Encode the first frame as the JPEG thumbnail.
///
/// `sentences` is the script length of the current run: with an empty
/// script, a `0-composite.png` on disk belongs to an earlier run and is
/// ignored. Whenever no thumbnail is written, an old one is removed.
pub async fn render_thumbnail(
    layout: &ArtifactLayout,
    sentences: usize,
    quality: u8,
) -> Result<ThumbnailOutcome, PipelineError> {
    let src = layout.composite(0);
    let dst = layout.thumbnail();
    if sentences == 0 || !src.is_file() {
        info!("No first frame, skipping thumbnail");
        remove_stale(&dst).await;
        return Ok(ThumbnailOutcome::Skipped);
    }

    let (s, d) = (src.clone(), dst.clone());
    let result = blocking(move || -> Result<(), ImageError> {
        let frame = load_image(&s)?;
        let jpeg = encode_thumbnail(&frame, quality)?;
        std::fs::write(&d, jpeg)?;
        Ok(())
    })
    .await?;

    Ok(match result {
        Ok(()) => {
            info!("Thumbnail written to {}", dst.display());
            ThumbnailOutcome::Written(dst)
        }
        Err(e) => {
            warn!("Thumbnail failed: {}", e);
            remove_stale(&dst).await;
            ThumbnailOutcome::Failed(StageIssue::ProcessingFailed {
                sentence: None,
                path: src,
                detail: e.to_string(),
            })
        }
    })
}
