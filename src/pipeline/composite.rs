//! Slide compositing: layout plan → deterministic base PNGs.
//!
//! No network and no randomness: the same plan and screenshots always give
//! pixel-identical files. Each slide is a solid background, optionally with
//! one screenshot resized into the padded area, rounded, shadowed and
//! anchored.
//!
//! Compositing is CPU-bound, so each slide runs on the blocking pool via
//! `spawn_blocking`, `render_concurrency` slides at a time. `buffered` (not
//! `buffer_unordered`) keeps the output in plan order.

use crate::config::PipelineConfig;
use crate::error::ComposeError;
use crate::model::{
    CanvasSize, LayoutPlan, Placement, PlacementSource, ResizeMode, ScreenshotInfo, SlideLayout,
};
use crate::output::{base_file_name, ProcessedSlide};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SHADOW_SIGMA: f32 = 18.0;
pub const SHADOW_OFFSET_Y: i64 = 12;
pub const SHADOW_ALPHA: u8 = 64;

/// Render every slide of `plan` into `output_dir` as `slide_NN_base.png`.
pub async fn render(
    plan: &LayoutPlan,
    screenshots: &[ScreenshotInfo],
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<Vec<ProcessedSlide>, ComposeError> {
    let total = plan.slides.len();
    info!("Compositing {} slide(s) at {}", total, plan.canvas);

    let jobs = plan
        .slides
        .iter()
        .map(|slide| {
            let source = match slide.placement.source {
                PlacementSource::Screenshot(i) => match screenshots.get(i) {
                    Some(info) => Some(info.path.clone()),
                    None => {
                        return Err(ComposeError::Render {
                            slide: slide.index,
                            detail: format!("screenshot {i} does not exist"),
                        })
                    }
                },
                PlacementSource::Generate => None,
            };
            Ok((slide.clone(), source))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let canvas = plan.canvas;
    stream::iter(jobs.into_iter().map(|(slide, source)| {
        let path = output_dir.join(base_file_name(slide.index));
        let progress = config.progress_callback.clone();
        async move {
            let index = slide.index;
            let done = tokio::task::spawn_blocking(move || {
                render_slide(&slide, canvas, source.as_deref(), path)
            })
            .await
            .map_err(|e| ComposeError::Internal(format!("Render task panicked: {e}")))??;
            if let Some(ref cb) = progress {
                cb.on_slide_composited(index, total);
            }
            Ok::<_, ComposeError>(done)
        }
    }))
    .buffered(config.render_concurrency)
    .try_collect()
    .await
}

fn render_slide(
    slide: &SlideLayout,
    canvas: CanvasSize,
    source: Option<&Path>,
    path: PathBuf,
) -> Result<ProcessedSlide, ComposeError> {
    let screenshot = source
        .map(|p| {
            image::open(p).map_err(|e| ComposeError::Render {
                slide: slide.index,
                detail: format!("cannot read {}: {e}", p.display()),
            })
        })
        .transpose()?;

    let img = compose_slide(slide, canvas, screenshot.as_ref());
    img.save_with_format(&path, ImageFormat::Png)
        .map_err(|e| match e {
            ImageError::IoError(source) => ComposeError::OutputWriteFailed {
                path: path.clone(),
                source,
            },
            other => ComposeError::Render {
                slide: slide.index,
                detail: other.to_string(),
            },
        })?;

    debug!("Slide {} composited → {}", slide.index, path.display());
    Ok(ProcessedSlide {
        index: slide.index,
        path,
        width: canvas.width,
        height: canvas.height,
    })
}

/// Draw one slide in memory.
pub fn compose_slide(
    slide: &SlideLayout,
    canvas: CanvasSize,
    screenshot: Option<&DynamicImage>,
) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba(slide.background_color.0));
    if let Some(img) = screenshot {
        place(&mut out, img, &slide.placement);
    }
    out
}

fn place(out: &mut RgbaImage, img: &DynamicImage, placement: &Placement) {
    let canvas = (out.width(), out.height());
    let area = available_area(canvas, placement.padding);
    let mut item = resize_into(img, placement.mode, area);
    if placement.border_radius > 0 {
        apply_rounded_mask(&mut item, placement.border_radius);
    }

    let (x, y) = placement
        .position
        .origin(canvas, item.dimensions(), placement.padding);

    if placement.shadow {
        let (shadow, margin) = drop_shadow(&item);
        imageops::overlay(out, &shadow, x - margin, y - margin + SHADOW_OFFSET_Y);
    }
    imageops::overlay(out, &item, x, y);
}

/// Canvas minus padding on both sides of each axis, at least 1px.
pub fn available_area(canvas: (u32, u32), padding: u32) -> (u32, u32) {
    let inset = padding.saturating_mul(2);
    (
        canvas.0.saturating_sub(inset).max(1),
        canvas.1.saturating_sub(inset).max(1),
    )
}

/// Resize `img` for `area` according to `mode`.
///
/// `Fill` and `Crop` return exactly `area`; `Fit` returns an image no larger
/// than `area` on either axis with the source aspect ratio.
pub fn resize_into(img: &DynamicImage, mode: ResizeMode, area: (u32, u32)) -> RgbaImage {
    let (aw, ah) = area;
    let (iw, ih) = (img.width().max(1), img.height().max(1));
    let sx = f64::from(aw) / f64::from(iw);
    let sy = f64::from(ah) / f64::from(ih);

    match mode {
        ResizeMode::Fill => img.resize_to_fill(aw, ah, FilterType::Lanczos3).to_rgba8(),
        ResizeMode::Fit => {
            // The limiting axis takes the area exactly; only the other one is scaled.
            let (tw, th) = if sx <= sy {
                (aw, ((f64::from(ih) * sx).round() as u32).clamp(1, ah))
            } else {
                (((f64::from(iw) * sy).round() as u32).clamp(1, aw), ah)
            };
            img.resize_exact(tw, th, FilterType::Lanczos3).to_rgba8()
        }
        ResizeMode::Crop => {
            let scale = sx.max(sy);
            let tw = ((f64::from(iw) * scale).ceil() as u32).max(aw);
            let th = ((f64::from(ih) * scale).ceil() as u32).max(ah);
            let scaled = img.resize_exact(tw, th, FilterType::Lanczos3);
            scaled.crop_imm((tw - aw) / 2, (th - ah) / 2, aw, ah).to_rgba8()
        }
    }
}

/// Round the corners of `img` in place with an anti-aliased alpha mask.
///
/// The radius is clamped to half the shorter side of `img` as it is now.
pub fn apply_rounded_mask(img: &mut RgbaImage, radius: u32) {
    let (w, h) = img.dimensions();
    let r = radius.min(w / 2).min(h / 2);
    if r == 0 {
        return;
    }
    let rf = r as f32;

    for y in 0..h {
        let cy = if y < r {
            rf
        } else if y >= h - r {
            (h - r) as f32
        } else {
            continue;
        };
        for x in (0..r).chain(w - r..w) {
            let cx = if x < r { rf } else { (w - r) as f32 };
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let coverage = (rf - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
            if coverage < 1.0 {
                let px = img.get_pixel_mut(x, y);
                px.0[3] = (f32::from(px.0[3]) * coverage).round() as u8;
            }
        }
    }
}

/// Blurred silhouette of `item`, with the margin added on every side.
fn drop_shadow(item: &RgbaImage) -> (RgbaImage, i64) {
    let margin = (SHADOW_SIGMA * 3.0).ceil() as u32;
    let mut layer = RgbaImage::new(item.width() + 2 * margin, item.height() + 2 * margin);
    for (x, y, px) in item.enumerate_pixels() {
        let a = (u16::from(px.0[3]) * u16::from(SHADOW_ALPHA) / 255) as u8;
        layer.put_pixel(x + margin, y + margin, Rgba([0, 0, 0, a]));
    }
    (imageops::blur(&layer, SHADOW_SIGMA), i64::from(margin))
}
