//! Typed data model shared by every pipeline stage.
//!
//! These are the *resolved* types: once a value of one of these types
//! exists, every field has been validated. Model responses are decoded into
//! stage-private wire types first (see [`crate::pipeline::plan`] for the
//! partial placement form) and converted here, so the compositor never has to
//! ask "is this field present?".
//!
//! All types serialise to camelCase JSON, the same shape the prompts ask the
//! model to produce, which keeps `--json` output and prompt examples aligned.

use crate::style::Palette;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Analysis ─────────────────────────────────────────────────────────────

/// Role tag of a [`ContentBlock`], used when assigning blocks to slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockRole {
    Title,
    Intro,
    Paragraph,
    Step,
    Tip,
    Callout,
    Quote,
    List,
    Summary,
}

/// One logical unit of the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentBlock {
    pub role: BlockRole,
    pub text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// What a screenshot is for in the story the slides tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotRole {
    Primary,
    Supporting,
    Detail,
    Comparison,
    Result,
}

/// Per-screenshot metadata. `index` always resolves into the run's
/// screenshot list; `width`/`height` are the original pixel dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotInfo {
    pub index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub role: ScreenshotRole,
    pub description: String,
    pub highlights: Vec<String>,
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A fully resolved slide plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPlan {
    pub canvas: CanvasSize,
    pub slides: Vec<SlideLayout>,
    pub color_palette: Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideType {
    Cover,
    Screenshot,
    TextOnly,
    Summary,
}

/// Layout of a single slide. `index` is unique and contiguous across a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideLayout {
    pub index: usize,
    #[serde(rename = "type")]
    pub slide_type: SlideType,
    pub background_color: Color,
    pub placement: Placement,
    pub text_layers: Vec<TextLayer>,
    pub annotations: Vec<Annotation>,
    pub content_block_index: Option<usize>,
}

impl SlideLayout {
    /// True when the beautify stage has nothing to draw on this slide.
    pub fn is_plain(&self) -> bool {
        self.text_layers.is_empty() && self.annotations.is_empty()
    }
}

/// Where the photographic content of a slide comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementSource {
    /// Index into the run's screenshot list.
    Screenshot(usize),
    /// No photographic source; the slide is background plus text.
    Generate,
}

impl Serialize for PlacementSource {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            PlacementSource::Screenshot(i) => s.serialize_u64(*i as u64),
            PlacementSource::Generate => s.serialize_str("generate"),
        }
    }
}

impl<'de> Deserialize<'de> for PlacementSource {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Index(usize),
            Keyword(String),
        }

        match Wire::deserialize(d)? {
            Wire::Index(i) => Ok(PlacementSource::Screenshot(i)),
            Wire::Keyword(k) if k == "generate" => Ok(PlacementSource::Generate),
            Wire::Keyword(k) => Err(de::Error::custom(format!(
                "placement source must be a screenshot index or \"generate\", got {k:?}"
            ))),
        }
    }
}

/// How a screenshot is scaled into the available area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Exactly fill the available area, cropping overflow.
    Fill,
    /// Fit inside the available area preserving aspect ratio; never crops.
    Fit,
    /// Cover the available area, centre-cropping overflow.
    Crop,
}

/// One of the nine placement anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::Top,
        Anchor::TopRight,
        Anchor::Left,
        Anchor::Center,
        Anchor::Right,
        Anchor::BottomLeft,
        Anchor::Bottom,
        Anchor::BottomRight,
    ];

    /// Top-left origin of an `item` placed on `canvas` at this anchor.
    ///
    /// Pure integer arithmetic; centred axes truncate towards zero. The
    /// result may be negative when the item is larger than the canvas.
    pub fn origin(self, canvas: (u32, u32), item: (u32, u32), padding: u32) -> (i64, i64) {
        let (cw, ch) = (i64::from(canvas.0), i64::from(canvas.1));
        let (iw, ih) = (i64::from(item.0), i64::from(item.1));
        let p = i64::from(padding);

        let start = p;
        let x_mid = (cw - iw) / 2;
        let y_mid = (ch - ih) / 2;
        let x_end = cw - iw - p;
        let y_end = ch - ih - p;

        match self {
            Anchor::TopLeft => (start, start),
            Anchor::Top => (x_mid, start),
            Anchor::TopRight => (x_end, start),
            Anchor::Left => (start, y_mid),
            Anchor::Center => (x_mid, y_mid),
            Anchor::Right => (x_end, y_mid),
            Anchor::BottomLeft => (start, y_end),
            Anchor::Bottom => (x_mid, y_end),
            Anchor::BottomRight => (x_end, y_end),
        }
    }

    /// Human-readable phrase used in prompts ("top right corner").
    pub fn describe(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left corner",
            Anchor::Top => "top centre",
            Anchor::TopRight => "top-right corner",
            Anchor::Left => "left side, vertically centred",
            Anchor::Center => "centre",
            Anchor::Right => "right side, vertically centred",
            Anchor::BottomLeft => "bottom-left corner",
            Anchor::Bottom => "bottom centre",
            Anchor::BottomRight => "bottom-right corner",
        }
    }
}

/// Fully resolved placement of a slide's photographic source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub source: PlacementSource,
    pub mode: ResizeMode,
    pub position: Anchor,
    pub padding: u32,
    pub border_radius: u32,
    pub shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextStyle {
    Title,
    Subtitle,
    Body,
    Badge,
    StepNumber,
    Caption,
    Bullet,
}

/// A piece of text the beautify stage draws onto a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextLayer {
    pub content: String,
    pub style: TextStyle,
    pub position: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationType {
    Circle,
    Arrow,
    Box,
    Underline,
}

/// What an annotation points at. Point coordinates are fractions of the
/// canvas, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum AnnotationTarget {
    TextMatch { text: String },
    Point { x: f32, y: f32 },
}

impl AnnotationTarget {
    pub fn is_in_bounds(&self) -> bool {
        match self {
            AnnotationTarget::TextMatch { text } => !text.trim().is_empty(),
            AnnotationTarget::Point { x, y } => {
                (0.0..=1.0).contains(x) && (0.0..=1.0).contains(y)
            }
        }
    }
}

/// A visual marker (circle, arrow, …) the beautify stage draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    pub target: AnnotationTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

// ── Colour ───────────────────────────────────────────────────────────────

/// An RGBA colour written as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02X}{g:02X}{b:02X}")
        } else {
            write!(f, "#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("colour {s:?} must start with '#'"))?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("colour {s:?} must be #RRGGBB or #RRGGBBAA"));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("colour {s:?} is not hex"))
        };
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Color([byte(0)?, byte(2)?, byte(4)?, alpha]))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}
