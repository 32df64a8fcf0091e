//! Layout planning: analysis in, an ordered and fully resolved slide plan out.
//!
//! The model answers with a partial plan where most placement knobs may be
//! omitted. Everything it leaves out is filled in by [`resolve_placement`],
//! and the result is checked against the run before anything is drawn: a
//! plan that points at a screenshot we do not have, or skips an index, never
//! reaches the compositor.

use crate::error::{excerpt, ComposeError};
use crate::model::{
    Anchor, Annotation, CanvasSize, Color, ContentBlock, LayoutPlan, Placement, PlacementSource,
    ResizeMode, ScreenshotInfo, SlideLayout, SlideType, TextLayer,
};
use crate::pipeline::extract::decode_response;
use crate::pipeline::inference::{InferenceRequest, InferenceService};
use crate::prompts::LAYOUT_PROMPT;
use crate::state::StageName;
use crate::style::{VisualStyle, CANVAS_CATALOGUE, MAX_CANVAS_SIDE};
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_MODE: ResizeMode = ResizeMode::Fit;
pub const DEFAULT_POSITION: Anchor = Anchor::Center;
pub const DEFAULT_PADDING: u32 = 60;
pub const DEFAULT_BORDER_RADIUS: u32 = 24;
pub const DEFAULT_SHADOW: bool = true;

/// A placement as the model may write it: only `source` is mandatory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialPlacement {
    pub source: PlacementSource,
    #[serde(default)]
    pub mode: Option<ResizeMode>,
    #[serde(default)]
    pub position: Option<Anchor>,
    #[serde(default)]
    pub padding: Option<u32>,
    #[serde(default)]
    pub border_radius: Option<u32>,
    #[serde(default)]
    pub shadow: Option<bool>,
}

/// Fill every omitted placement field with its default.
///
/// A missing placement means the slide has no screenshot.
pub fn resolve_placement(partial: Option<PartialPlacement>) -> Placement {
    match partial {
        None => Placement {
            source: PlacementSource::Generate,
            mode: DEFAULT_MODE,
            position: DEFAULT_POSITION,
            padding: DEFAULT_PADDING,
            border_radius: DEFAULT_BORDER_RADIUS,
            shadow: DEFAULT_SHADOW,
        },
        Some(p) => Placement {
            source: p.source,
            mode: p.mode.unwrap_or(DEFAULT_MODE),
            position: p.position.unwrap_or(DEFAULT_POSITION),
            padding: p.padding.unwrap_or(DEFAULT_PADDING),
            border_radius: p.border_radius.unwrap_or(DEFAULT_BORDER_RADIUS),
            shadow: p.shadow.unwrap_or(DEFAULT_SHADOW),
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePlan {
    canvas: CanvasSize,
    slides: Vec<WireSlide>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireSlide {
    index: usize,
    #[serde(rename = "type")]
    slide_type: SlideType,
    background_color: Color,
    #[serde(default)]
    placement: Option<PartialPlacement>,
    #[serde(default)]
    text_layers: Vec<TextLayer>,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default)]
    content_block_index: Option<usize>,
}

/// The planner's result plus what it cost.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: LayoutPlan,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Plan the carousel for an analysed post.
pub async fn plan(
    service: &dyn InferenceService,
    blocks: &[ContentBlock],
    screenshots: &[ScreenshotInfo],
    content_type: &str,
    theme: &str,
    style: VisualStyle,
) -> Result<PlanOutcome, ComposeError> {
    let palette = style.palette();
    let prompt = LAYOUT_PROMPT.render(&[
        ("content_type", content_type),
        ("theme", theme),
        ("style", style.name()),
        ("blocks", &describe_blocks(blocks)),
        ("screenshot_count", &screenshots.len().to_string()),
        ("screenshots", &describe_screenshots(screenshots)),
        (
            "palette",
            &format!(
                "primary {}, secondary {}, background {}, text {}, accent {}",
                palette.primary, palette.secondary, palette.background, palette.text, palette.accent
            ),
        ),
        ("canvas_options", &describe_canvases()),
    ])?;

    info!(
        "Planning layout: {} blocks, {} screenshots, style={}",
        blocks.len(),
        screenshots.len(),
        style
    );

    let response = service
        .infer(InferenceRequest::text(prompt, Vec::new()))
        .await
        .map_err(|source| ComposeError::Inference {
            stage: StageName::Plan,
            source,
        })?;

    let plan = parse_plan(&response.text, screenshots.len(), blocks.len(), style)?;
    debug!("Layout plan: {} slides on {}", plan.slides.len(), plan.canvas);

    Ok(PlanOutcome {
        plan,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
    })
}

/// Decode, resolve and validate a layout response.
pub fn parse_plan(
    text: &str,
    screenshot_count: usize,
    block_count: usize,
    style: VisualStyle,
) -> Result<LayoutPlan, ComposeError> {
    let fail = |detail: String| ComposeError::LayoutParse {
        detail,
        excerpt: excerpt(text, 200),
    };

    let wire: WirePlan = decode_response(text).map_err(fail)?;

    let canvas = wire.canvas;
    let side_ok = |v: u32| (1..=MAX_CANVAS_SIDE).contains(&v);
    if !side_ok(canvas.width) || !side_ok(canvas.height) {
        return Err(fail(format!("canvas {canvas} outside 1..={MAX_CANVAS_SIDE} px")));
    }
    if wire.slides.is_empty() {
        return Err(fail("plan has no slides".into()));
    }

    let mut raw = wire.slides;
    raw.sort_by_key(|s| s.index);

    let mut slides = Vec::with_capacity(raw.len());
    for (expected, slide) in raw.into_iter().enumerate() {
        if slide.index != expected {
            return Err(fail(format!(
                "slide indices must be contiguous from 0; expected {expected}, found {}",
                slide.index
            )));
        }

        let placement = resolve_placement(slide.placement);
        if let PlacementSource::Screenshot(i) = placement.source {
            if i >= screenshot_count {
                return Err(fail(format!(
                    "slide {expected} uses screenshot {i}, only {screenshot_count} available"
                )));
            }
        }
        if let Some(b) = slide.content_block_index {
            if b >= block_count {
                return Err(fail(format!(
                    "slide {expected} references content block {b}, only {block_count} exist"
                )));
            }
        }
        if let Some(a) = slide.annotations.iter().find(|a| !a.target.is_in_bounds()) {
            return Err(fail(format!(
                "slide {expected} has an annotation target outside the canvas: {:?}",
                a.target
            )));
        }

        slides.push(SlideLayout {
            index: slide.index,
            slide_type: slide.slide_type,
            background_color: slide.background_color,
            placement,
            text_layers: slide.text_layers,
            annotations: slide.annotations,
            content_block_index: slide.content_block_index,
        });
    }

    Ok(LayoutPlan {
        canvas,
        slides,
        color_palette: style.palette(),
    })
}

fn describe_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let mut line = format!("{i}. [{:?}] {}", b.role, b.text);
            if !b.key_points.is_empty() {
                line.push_str(&format!(" (key points: {})", b.key_points.join("; ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_screenshots(screenshots: &[ScreenshotInfo]) -> String {
    if screenshots.is_empty() {
        return "none".to_string();
    }
    screenshots
        .iter()
        .map(|s| {
            let mut line = format!(
                "{}. {}x{} px, {:?}: {}",
                s.index, s.width, s.height, s.role, s.description
            );
            if !s.highlights.is_empty() {
                line.push_str(&format!(" (highlights: {})", s.highlights.join("; ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_canvases() -> String {
    CANVAS_CATALOGUE
        .iter()
        .map(|(size, label)| format!("- {size} ({label})"))
        .collect::<Vec<_>>()
        .join("\n")
}
