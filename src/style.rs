//! Visual styles, their colour palettes, and the canvas-size catalogue.
//!
//! The planner resolves one [`VisualStyle`] per run and hands its
//! [`Palette`] to the model; the table is static so two runs with the same
//! style always ask for the same colours.

use crate::model::{CanvasSize, Color};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named look of a carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualStyle {
    /// White space, one accent colour. (default)
    #[default]
    Minimal,
    /// Saturated gradients and bold type.
    Vibrant,
    /// Muted corporate blues.
    Professional,
    /// Cream and terracotta, lifestyle content.
    Warm,
    /// Dark background, neon accent.
    Dark,
}

impl VisualStyle {
    pub const ALL: [VisualStyle; 5] = [
        VisualStyle::Minimal,
        VisualStyle::Vibrant,
        VisualStyle::Professional,
        VisualStyle::Warm,
        VisualStyle::Dark,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VisualStyle::Minimal => "minimal",
            VisualStyle::Vibrant => "vibrant",
            VisualStyle::Professional => "professional",
            VisualStyle::Warm => "warm",
            VisualStyle::Dark => "dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            VisualStyle::Minimal => Palette {
                primary: Color::rgb(0x11, 0x11, 0x11),
                secondary: Color::rgb(0x6B, 0x72, 0x80),
                background: Color::rgb(0xFA, 0xFA, 0xFA),
                text: Color::rgb(0x1F, 0x29, 0x37),
                accent: Color::rgb(0xFF, 0x4D, 0x4F),
            },
            VisualStyle::Vibrant => Palette {
                primary: Color::rgb(0x7C, 0x3A, 0xED),
                secondary: Color::rgb(0xEC, 0x48, 0x99),
                background: Color::rgb(0xFF, 0xF7, 0xED),
                text: Color::rgb(0x1E, 0x1B, 0x4B),
                accent: Color::rgb(0xF5, 0x9E, 0x0B),
            },
            VisualStyle::Professional => Palette {
                primary: Color::rgb(0x1E, 0x3A, 0x8A),
                secondary: Color::rgb(0x47, 0x55, 0x69),
                background: Color::rgb(0xF8, 0xFA, 0xFC),
                text: Color::rgb(0x0F, 0x17, 0x2A),
                accent: Color::rgb(0x0E, 0xA5, 0xE9),
            },
            VisualStyle::Warm => Palette {
                primary: Color::rgb(0xC2, 0x41, 0x0C),
                secondary: Color::rgb(0x92, 0x40, 0x0E),
                background: Color::rgb(0xFF, 0xF8, 0xF0),
                text: Color::rgb(0x43, 0x14, 0x07),
                accent: Color::rgb(0xEA, 0xB3, 0x08),
            },
            VisualStyle::Dark => Palette {
                primary: Color::rgb(0xF9, 0xFA, 0xFB),
                secondary: Color::rgb(0x9C, 0xA3, 0xAF),
                background: Color::rgb(0x11, 0x18, 0x27),
                text: Color::rgb(0xF3, 0xF4, 0xF6),
                accent: Color::rgb(0x22, 0xD3, 0xEE),
            },
        }
    }

    /// Pick the effective style: explicit override, else a suggestion that
    /// names a known style, else `fallback`.
    pub fn resolve(
        explicit: Option<VisualStyle>,
        suggested: Option<&str>,
        fallback: VisualStyle,
    ) -> VisualStyle {
        explicit
            .or_else(|| suggested.and_then(|s| s.parse().ok()))
            .unwrap_or(fallback)
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        VisualStyle::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| format!("unknown style {s:?}"))
    }
}

/// Colour palette attached to a layout plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub background: Color,
    pub text: Color,
    pub accent: Color,
}

/// Canvas sizes offered to the layout model, most common first.
pub const CANVAS_CATALOGUE: [(CanvasSize, &str); 4] = [
    (CanvasSize { width: 1080, height: 1440 }, "3:4 portrait (default)"),
    (CanvasSize { width: 1080, height: 1080 }, "1:1 square"),
    (CanvasSize { width: 1080, height: 1350 }, "4:5 portrait"),
    (CanvasSize { width: 1080, height: 1920 }, "9:16 story"),
];

/// Largest side the planner accepts for any canvas.
pub const MAX_CANVAS_SIDE: u32 = 4096;
