//! Quality audit: one look at the whole finished carousel.
//!
//! Read-only. The verdict is returned to the caller and nothing is
//! re-rendered, whatever it says.

use crate::config::PipelineConfig;
use crate::error::{excerpt, ComposeError};
use crate::output::{ProcessedSlide, QualityReport};
use crate::pipeline::encode;
use crate::pipeline::extract::decode_response;
use crate::pipeline::inference::{InferenceRequest, InferenceService};
use crate::prompts::AUDIT_PROMPT;
use crate::state::StageName;
use edgequake_llm::ImageData;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The audit verdict plus what it cost.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub report: QualityReport,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Audit the final `slides` against the source `content`.
pub async fn audit(
    service: &dyn InferenceService,
    slides: &[ProcessedSlide],
    content: &str,
    config: &PipelineConfig,
) -> Result<AuditOutcome, ComposeError> {
    let thumbnails = thumbnails(
        slides.iter().map(|s| s.path.clone()).collect(),
        config.thumbnail_max_dimension,
        config.jpeg_quality,
    )
    .await?;

    let prompt = AUDIT_PROMPT.render(&[
        ("slide_count", &slides.len().to_string()),
        ("content", content),
    ])?;

    info!("Auditing {} slide(s)", slides.len());
    let response = service
        .infer(InferenceRequest::text(prompt, thumbnails))
        .await
        .map_err(|source| ComposeError::Inference {
            stage: StageName::Audit,
            source,
        })?;

    let report = parse_report(&response.text)?;
    if report.overall_passed {
        debug!("Audit passed: {}", report.summary);
    } else {
        warn!("Audit flagged {} issue(s): {}", report.issues.len(), report.summary);
    }

    Ok(AuditOutcome {
        report,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
    })
}

/// Strictly decode an audit answer.
pub fn parse_report(text: &str) -> Result<QualityReport, ComposeError> {
    decode_response(text).map_err(|detail| ComposeError::QualityParse {
        detail,
        excerpt: excerpt(text, 200),
    })
}

async fn thumbnails(
    paths: Vec<PathBuf>,
    max_dimension: u32,
    quality: u8,
) -> Result<Vec<ImageData>, ComposeError> {
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|path| -> Result<ImageData, ComposeError> {
                let img = image::open(path).map_err(|e| {
                    ComposeError::Internal(format!("cannot read slide {}: {e}", path.display()))
                })?;
                encode::prepare_jpeg(&img, max_dimension, quality).map_err(|e| {
                    ComposeError::Internal(format!("cannot encode thumbnail: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| ComposeError::Internal(format!("Thumbnail task panicked: {e}")))?
}
