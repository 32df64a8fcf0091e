//! Content analysis: source text and screenshots → structured blocks.
//!
//! One vision call sees every screenshot (downscaled, JPEG) plus the raw
//! text. The model never sees file paths; it refers to screenshots by
//! position, and we re-attach path and original dimensions after checking
//! that every position it returned is real.

use crate::config::PipelineConfig;
use crate::error::{excerpt, ComposeError};
use crate::model::{ContentBlock, ScreenshotInfo, ScreenshotRole};
use crate::pipeline::encode;
use crate::pipeline::extract::decode_response;
use crate::pipeline::inference::{InferenceRequest, InferenceService};
use crate::prompts::ANALYSIS_PROMPT;
use crate::state::StageName;
use edgequake_llm::ImageData;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything the analysis stage contributes to the run state.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentAnalysis {
    pub content_blocks: Vec<ContentBlock>,
    pub screenshots: Vec<ScreenshotInfo>,
    pub content_type: String,
    pub theme: String,
    pub suggested_style: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireAnalysis {
    content_blocks: Vec<ContentBlock>,
    screenshots: Vec<WireScreenshot>,
    content_type: String,
    theme: String,
    suggested_style: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireScreenshot {
    index: usize,
    role: ScreenshotRole,
    description: String,
    #[serde(default)]
    highlights: Vec<String>,
}

/// A screenshot ready for the analysis request.
struct PreparedScreenshot {
    image: ImageData,
    width: u32,
    height: u32,
}

/// Analyse `content` and `screenshots` with one inference call.
pub async fn analyze(
    service: &dyn InferenceService,
    content: &str,
    screenshots: &[PathBuf],
    requirements: Option<&str>,
    config: &PipelineConfig,
) -> Result<ContentAnalysis, ComposeError> {
    let prepared = prepare_screenshots(
        screenshots.to_vec(),
        config.analysis_max_dimension,
        config.jpeg_quality,
    )
    .await?;

    let dimensions: Vec<(u32, u32)> = prepared.iter().map(|p| (p.width, p.height)).collect();
    let dimension_lines = dimensions
        .iter()
        .enumerate()
        .map(|(i, (w, h))| format!("- screenshot {i}: {w}x{h} px"))
        .collect::<Vec<_>>()
        .join("\n");
    let count = screenshots.len().to_string();

    let prompt = ANALYSIS_PROMPT.render(&[
        ("content", content),
        ("screenshot_count", &count),
        ("screenshot_dimensions", &dimension_lines),
        ("requirements", requirements.unwrap_or("none")),
    ])?;

    let images = prepared.into_iter().map(|p| p.image).collect();
    info!("Analysing content with {} screenshot(s)", screenshots.len());

    let response = service
        .infer(InferenceRequest::text(prompt, images))
        .await
        .map_err(|source| ComposeError::Inference {
            stage: StageName::Analyze,
            source,
        })?;

    let mut analysis = parse_analysis(&response.text, screenshots, &dimensions)?;
    analysis.input_tokens = response.input_tokens;
    analysis.output_tokens = response.output_tokens;
    debug!(
        "Analysis: {} blocks, type={}, theme={}, style={}",
        analysis.content_blocks.len(),
        analysis.content_type,
        analysis.theme,
        analysis.suggested_style
    );
    Ok(analysis)
}

/// Decode and validate the model's answer.
///
/// `dimensions[i]` are the original pixel dimensions of `screenshots[i]`.
pub fn parse_analysis(
    text: &str,
    screenshots: &[PathBuf],
    dimensions: &[(u32, u32)],
) -> Result<ContentAnalysis, ComposeError> {
    let fail = |detail: String| ComposeError::AnalysisParse {
        detail,
        excerpt: excerpt(text, 200),
    };

    let wire: WireAnalysis = decode_response(text).map_err(fail)?;

    if wire.content_blocks.is_empty() {
        return Err(fail("no content blocks".into()));
    }

    let mut slots: Vec<Option<ScreenshotInfo>> = vec![None; screenshots.len()];
    for shot in wire.screenshots {
        let slot = slots.get_mut(shot.index).ok_or_else(|| {
            fail(format!(
                "screenshot index {} out of range (have {})",
                shot.index,
                screenshots.len()
            ))
        })?;
        if slot.is_some() {
            return Err(fail(format!("screenshot index {} described twice", shot.index)));
        }
        let (width, height) = dimensions.get(shot.index).copied().unwrap_or((0, 0));
        *slot = Some(ScreenshotInfo {
            index: shot.index,
            path: screenshots[shot.index].clone(),
            width,
            height,
            role: shot.role,
            description: shot.description,
            highlights: shot.highlights,
        });
    }

    let screenshot_infos = slots
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| fail(format!("screenshot {i} not described"))))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ContentAnalysis {
        content_blocks: wire.content_blocks,
        screenshots: screenshot_infos,
        content_type: wire.content_type,
        theme: wire.theme,
        suggested_style: wire.suggested_style,
        input_tokens: 0,
        output_tokens: 0,
    })
}

/// Decode, downscale and encode every screenshot on the blocking pool.
async fn prepare_screenshots(
    paths: Vec<PathBuf>,
    max_dimension: u32,
    quality: u8,
) -> Result<Vec<PreparedScreenshot>, ComposeError> {
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|path| -> Result<PreparedScreenshot, ComposeError> {
                let img = image::open(path).map_err(|e| ComposeError::NotAnImage {
                    path: path.clone(),
                    detail: e.to_string(),
                })?;
                let image = encode::prepare_jpeg(&img, max_dimension, quality).map_err(|e| {
                    ComposeError::NotAnImage {
                        path: path.clone(),
                        detail: format!("re-encoding failed: {e}"),
                    }
                })?;
                Ok(PreparedScreenshot {
                    image,
                    width: img.width(),
                    height: img.height(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| ComposeError::Internal(format!("Screenshot preparation task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockRole;

    fn shots(n: usize) -> (Vec<PathBuf>, Vec<(u32, u32)>) {
        let paths = (0..n).map(|i| PathBuf::from(format!("shot{i}.png"))).collect();
        let dims = (0..n).map(|i| (100 + i as u32, 200)).collect();
        (paths, dims)
    }

    const GOOD: &str = r#"```json
{
  "contentBlocks": [
    {"role": "title", "text": "Five tips for better sleep"},
    {"role": "tip", "text": "Keep a schedule", "keyPoints": ["same time daily"]}
  ],
  "screenshots": [
    {"index": 1, "role": "detail", "description": "settings", "highlights": ["Bedtime"]},
    {"index": 0, "role": "primary", "description": "sleep app home"}
  ],
  "contentType": "tips",
  "theme": "sleep hygiene",
  "suggestedStyle": "minimal"
}
```"#;

    #[test]
    fn reattaches_paths_in_index_order() {
        let (paths, dims) = shots(2);
        let a = parse_analysis(GOOD, &paths, &dims).expect("valid analysis");
        assert_eq!(a.content_blocks.len(), 2);
        assert_eq!(a.content_blocks[1].role, BlockRole::Tip);
        assert_eq!(a.screenshots[0].path, PathBuf::from("shot0.png"));
        assert_eq!(a.screenshots[0].role, ScreenshotRole::Primary);
        assert_eq!(a.screenshots[1].width, 101);
        assert_eq!(a.screenshots[1].highlights, vec!["Bedtime".to_string()]);
        assert_eq!(a.suggested_style, "minimal");
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let (paths, dims) = shots(1);
        let err = parse_analysis("Sorry, I can't see the images.", &paths, &dims).unwrap_err();
        assert!(matches!(err, ComposeError::AnalysisParse { .. }));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (paths, dims) = shots(1);
        let err = parse_analysis(GOOD, &paths, &dims).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn missing_screenshot_is_rejected() {
        let (paths, dims) = shots(3);
        let err = parse_analysis(GOOD, &paths, &dims).unwrap_err();
        assert!(err.to_string().contains("screenshot 2 not described"), "{err}");
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let (paths, dims) = shots(1);
        let text = r#"{"contentBlocks":[{"role":"title","text":"t"}],
            "screenshots":[{"index":0,"role":"primary","description":"a"},
                           {"index":0,"role":"detail","description":"b"}],
            "contentType":"tips","theme":"x","suggestedStyle":"dark"}"#;
        let err = parse_analysis(text, &paths, &dims).unwrap_err();
        assert!(err.to_string().contains("described twice"), "{err}");
    }

    #[test]
    fn missing_field_fails_closed() {
        let (paths, dims) = shots(0);
        let text = r#"{"contentBlocks":[{"role":"title","text":"t"}],"screenshots":[],
            "contentType":"tips","theme":"x"}"#;
        let err = parse_analysis(text, &paths, &dims).unwrap_err();
        assert!(err.to_string().contains("suggestedStyle"), "{err}");
    }

    #[test]
    fn unknown_role_fails_closed() {
        let (paths, dims) = shots(0);
        let text = r#"{"contentBlocks":[{"role":"haiku","text":"t"}],"screenshots":[],
            "contentType":"tips","theme":"x","suggestedStyle":"dark"}"#;
        assert!(parse_analysis(text, &paths, &dims).is_err());
    }
}
