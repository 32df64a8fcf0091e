//! Prompt templates for every inference call the pipeline makes.
//!
//! All prompt text lives here so wording changes never touch stage logic,
//! and unit tests can inspect prompts without a model. Templates use
//! `{{name}}` placeholders; [`PromptTemplate::render`] refuses to return a
//! prompt with a placeholder left in it.

use crate::error::ComposeError;
use crate::model::{Annotation, AnnotationTarget, AnnotationType, TextLayer, TextStyle};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// A named prompt with `{{name}}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    /// Substitute every placeholder from `vars`.
    ///
    /// Substitution is single-pass: a value that itself contains `{{x}}` is
    /// inserted literally.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, ComposeError> {
        let mut missing: Option<String> = None;
        let rendered = RE_PLACEHOLDER.replace_all(self.body, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match vars.iter().find(|(k, _)| *k == key) {
                Some((_, v)) => (*v).to_string(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(placeholder) => Err(ComposeError::Template {
                template: self.name,
                placeholder,
            }),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Content analysis: text plus all screenshots in one call.
pub const ANALYSIS_PROMPT: PromptTemplate = PromptTemplate {
    name: "analysis",
    body: r#"You are a social-media content strategist. You receive a piece of source text and {{screenshot_count}} screenshot(s), attached in order (screenshot 0 first).

SOURCE TEXT:
"""
{{content}}
"""

SCREENSHOT DIMENSIONS (original pixels):
{{screenshot_dimensions}}

USER REQUIREMENTS:
{{requirements}}

Break the text into logical content blocks and describe every screenshot.

Respond with ONE JSON object and nothing else, exactly in this shape:
{
  "contentBlocks": [
    {"role": "title|intro|paragraph|step|tip|callout|quote|list|summary", "text": "...", "keyPoints": ["..."]}
  ],
  "screenshots": [
    {"index": 0, "role": "primary|supporting|detail|comparison|result", "description": "...", "highlights": ["text visible in the screenshot worth pointing at"]}
  ],
  "contentType": "tutorial|tips|comparison|story|announcement|review|other",
  "theme": "short phrase describing the topic",
  "suggestedStyle": "minimal|vibrant|professional|warm|dark"
}

Rules:
- Describe every screenshot exactly once, using its 0-based index.
- Keep block text faithful to the source; do not invent facts.
- Do not add fields that are not listed above."#,
};

/// Layout planning: analysis in, slide plan out.
pub const LAYOUT_PROMPT: PromptTemplate = PromptTemplate {
    name: "layout",
    body: r##"You are a carousel layout designer. Plan an ordered set of slides for a {{content_type}} post about "{{theme}}" in the "{{style}}" style.

CONTENT BLOCKS (0-based, in order):
{{blocks}}

SCREENSHOTS (0-based, {{screenshot_count}} total):
{{screenshots}}

PALETTE:
{{palette}}

SUPPORTED CANVAS SIZES:
{{canvas_options}}

Respond with ONE JSON object and nothing else, exactly in this shape:
{
  "canvas": {"width": 1080, "height": 1440},
  "slides": [
    {
      "index": 0,
      "type": "cover|screenshot|text-only|summary",
      "backgroundColor": "#RRGGBB",
      "placement": {
        "source": 0,
        "mode": "fill|fit|crop",
        "position": "center|top|bottom|left|right|top-left|top-right|bottom-left|bottom-right",
        "padding": 60,
        "borderRadius": 24,
        "shadow": true
      },
      "textLayers": [
        {"content": "...", "style": "title|subtitle|body|badge|step-number|caption|bullet", "position": "top", "color": "#RRGGBB", "backgroundColor": "#RRGGBB"}
      ],
      "annotations": [
        {"type": "circle|arrow|box|underline", "target": {"type": "text-match", "text": "exact text in the screenshot"}, "label": "...", "color": "#RRGGBB"},
        {"type": "arrow", "target": {"type": "point", "x": 0.5, "y": 0.3}}
      ],
      "contentBlockIndex": 0
    }
  ]
}

Rules:
- The first slide is a cover: "source": "generate" and a text layer with style "title".
- Slide indices start at 0 and increase by one.
- "source" is a screenshot index or the string "generate" for slides without a screenshot.
- Point coordinates are fractions of the canvas between 0 and 1.
- Use colours from the palette.
- "mode", "position", "padding", "borderRadius", "shadow", "color", "backgroundColor" (of text layers), "label", and "contentBlockIndex" may be omitted.
- Do not add fields that are not listed above."##,
};

/// Beautify: edit one base slide, optionally matching a reference slide.
pub const BEAUTIFY_PROMPT: PromptTemplate = PromptTemplate {
    name: "beautify",
    body: r#"You are a graphic designer finishing slide {{slide_number}} of {{total_slides}} of a social-media carousel.

The FIRST attached image is the slide to edit. Its canvas is {{canvas}} pixels.
{{reference_note}}
Apply exactly these edits, keeping everything else on the slide unchanged:
{{instructions}}

Rules:
- Keep the screenshot content legible; never cover the parts that annotations point at.
- Text must be spelled exactly as given.
- Return the edited slide as a single image with the same aspect ratio."#,
};

/// Sentence added when a style reference is attached.
pub const REFERENCE_NOTE: &str = "The SECOND attached image is the previous finished slide. Match its typography, colours and decoration style so the carousel looks consistent.\n";

/// Audit: all thumbnails plus the source text.
pub const AUDIT_PROMPT: PromptTemplate = PromptTemplate {
    name: "audit",
    body: r#"You are a quality reviewer for social-media carousels. The {{slide_count}} attached images are the finished slides, in order.

ORIGINAL CONTENT:
"""
{{content}}
"""

Check that the slides are coherent as a set: consistent visual style, legible text, no spelling mistakes, no missing or contradicting information compared with the original content, and a clear cover.

Respond with ONE JSON object and nothing else:
{"overallPassed": true, "issues": ["slide 2: ..."], "summary": "one or two sentences"}"#,
};

/// Rendering instruction for one text layer.
pub fn describe_text_layer(layer: &TextLayer) -> String {
    let style = match layer.style {
        TextStyle::Title => "as a large bold headline",
        TextStyle::Subtitle => "as a medium-weight subtitle below the headline size",
        TextStyle::Body => "as regular body text, left-aligned, comfortable line height",
        TextStyle::Badge => "inside a small rounded pill-shaped badge",
        TextStyle::StepNumber => "as a large step number inside a filled circle",
        TextStyle::Caption => "as a small caption in a lighter weight",
        TextStyle::Bullet => "as a bullet-point line with a round bullet marker",
    };
    let mut out = format!(
        "Write \"{}\" {} at the {}",
        layer.content,
        style,
        layer.position.describe()
    );
    if let Some(c) = layer.color {
        out.push_str(&format!(", text colour {c}"));
    }
    if let Some(bg) = layer.background_color {
        out.push_str(&format!(", on a {bg} background"));
    }
    out.push('.');
    out
}

/// Rendering instruction for one annotation.
pub fn describe_annotation(annotation: &Annotation) -> String {
    let shape = match annotation.annotation_type {
        AnnotationType::Circle => "Draw a hand-drawn style circle around",
        AnnotationType::Arrow => "Draw a bold curved arrow pointing at",
        AnnotationType::Box => "Draw a rounded highlight box around",
        AnnotationType::Underline => "Draw a thick marker underline beneath",
    };
    let target = match &annotation.target {
        AnnotationTarget::TextMatch { text } => {
            format!("the text \"{text}\" (locate it in the screenshot)")
        }
        AnnotationTarget::Point { x, y } => format!(
            "the point {:.0}% from the left and {:.0}% from the top of the slide",
            x * 100.0,
            y * 100.0
        ),
    };
    let mut out = format!("{shape} {target}");
    if let Some(c) = annotation.color {
        out.push_str(&format!(" in {c}"));
    }
    if let Some(label) = &annotation.label {
        out.push_str(&format!(", labelled \"{label}\""));
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Anchor, Color};

    #[test]
    fn render_substitutes_all_placeholders() {
        let t = PromptTemplate {
            name: "t",
            body: "Hello {{ name }}, you have {{count}} slides.",
        };
        let out = t.render(&[("name", "Ada"), ("count", "3")]).unwrap();
        assert_eq!(out, "Hello Ada, you have 3 slides.");
    }

    #[test]
    fn render_reports_missing_placeholder() {
        let t = PromptTemplate {
            name: "t",
            body: "{{a}} and {{b}}",
        };
        let err = t.render(&[("a", "x")]).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Template { template: "t", ref placeholder } if placeholder == "b"
        ));
    }

    #[test]
    fn values_are_not_re_expanded() {
        let t = PromptTemplate {
            name: "t",
            body: "{{content}}",
        };
        assert_eq!(t.render(&[("content", "{{secret}}")]).unwrap(), "{{secret}}");
    }

    #[test]
    fn json_examples_are_not_placeholders() {
        let vars = [
            ("content_type", "tips"),
            ("theme", "sleep"),
            ("style", "minimal"),
            ("blocks", "[]"),
            ("screenshot_count", "1"),
            ("screenshots", "[]"),
            ("palette", "{}"),
            ("canvas_options", "1080x1440"),
        ];
        let out = LAYOUT_PROMPT.render(&vars).expect("layout prompt renders");
        assert!(out.contains("\"textLayers\""));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn layout_prompt_keeps_hex_colour_examples() {
        assert!(LAYOUT_PROMPT.body.contains(r##""backgroundColor": "#RRGGBB""##));
        assert!(LAYOUT_PROMPT
            .body
            .ends_with("- Do not add fields that are not listed above."));
    }

    #[test]
    fn text_styles_get_distinct_phrasing() {
        let styles = [
            TextStyle::Title,
            TextStyle::Subtitle,
            TextStyle::Body,
            TextStyle::Badge,
            TextStyle::StepNumber,
            TextStyle::Caption,
            TextStyle::Bullet,
        ];
        let phrases: std::collections::HashSet<String> = styles
            .iter()
            .map(|&style| {
                describe_text_layer(&TextLayer {
                    content: "x".into(),
                    style,
                    position: Anchor::Top,
                    color: None,
                    background_color: None,
                })
            })
            .collect();
        assert_eq!(phrases.len(), styles.len());
    }

    #[test]
    fn text_layer_mentions_colours() {
        let s = describe_text_layer(&TextLayer {
            content: "Tip 1".into(),
            style: TextStyle::Badge,
            position: Anchor::TopLeft,
            color: Some(Color::WHITE),
            background_color: Some(Color::BLACK),
        });
        assert!(s.contains("\"Tip 1\""));
        assert!(s.contains("#FFFFFF"));
        assert!(s.contains("#000000 background"));
        assert!(s.contains("top-left corner"));
    }

    #[test]
    fn annotation_targets_are_resolved() {
        let by_text = describe_annotation(&Annotation {
            annotation_type: AnnotationType::Circle,
            target: AnnotationTarget::TextMatch {
                text: "Save".into(),
            },
            label: Some("tap here".into()),
            color: None,
        });
        assert!(by_text.contains("circle around the text \"Save\""));
        assert!(by_text.contains("labelled \"tap here\""));

        let by_point = describe_annotation(&Annotation {
            annotation_type: AnnotationType::Arrow,
            target: AnnotationTarget::Point { x: 0.25, y: 0.8 },
            label: None,
            color: None,
        });
        assert!(by_point.contains("25% from the left"));
        assert!(by_point.contains("80% from the top"));
    }
}
