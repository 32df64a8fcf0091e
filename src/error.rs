//! Error types for the edgequake-carousel library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ComposeError`] — **Fatal**: the run cannot proceed (malformed model
//!   output, missing screenshot, provider not configured, a stage called
//!   without its upstream state). Returned as `Err(ComposeError)` from
//!   [`crate::run::run_pipeline`] with the failing stage attached.
//!
//! * [`InferenceError`] — a transport or service failure of one inference
//!   call. Fatal for analysis, layout and audit (wrapped in
//!   [`ComposeError::Inference`]), degraded-not-fatal for beautify.
//!
//! * [`SlideError`] — **Non-fatal**: one slide could not be beautified and
//!   fell back to its base image. Reported through the progress callback and
//!   counted in [`crate::output::PipelineStats`].

use crate::state::StageName;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-carousel library.
#[derive(Debug, Error)]
pub enum ComposeError {
    // ── Structured-response errors ────────────────────────────────────────
    /// The analysis response was not valid JSON or did not match the schema.
    #[error("analysis stage: malformed model response: {detail}\nResponse began with: {excerpt:?}")]
    AnalysisParse { detail: String, excerpt: String },

    /// The layout response was not valid JSON or violated a layout invariant.
    #[error("layout stage: malformed model response: {detail}\nResponse began with: {excerpt:?}")]
    LayoutParse { detail: String, excerpt: String },

    /// The audit response was not valid JSON or did not match the schema.
    #[error("audit stage: malformed model response: {detail}\nResponse began with: {excerpt:?}")]
    QualityParse { detail: String, excerpt: String },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The inference service failed during a stage that cannot degrade.
    #[error("{stage} stage: inference failed: {source}")]
    Inference {
        stage: StageName,
        #[source]
        source: InferenceError,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Contract errors ───────────────────────────────────────────────────
    /// A stage was invoked without the upstream state it depends on.
    #[error("{stage} stage invoked without {missing}")]
    Precondition {
        stage: StageName,
        missing: &'static str,
    },

    /// Caller-supplied input is unusable (empty content, no screenshots).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// A screenshot was not found at the given path.
    #[error("Screenshot not found: '{path}'\nCheck the path exists and is readable.")]
    ScreenshotNotFound { path: PathBuf },

    /// The file exists but is not a decodable PNG or JPEG image.
    #[error("Screenshot '{path}' is not a supported image: {detail}")]
    NotAnImage { path: PathBuf, detail: String },

    /// A remote screenshot could not be downloaded.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Rendering / IO errors ─────────────────────────────────────────────
    /// Compositing a slide failed.
    #[error("Rendering slide {slide} failed: {detail}")]
    Render { slide: usize, detail: String },

    /// Could not create or write an output artifact.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A prompt template referenced a variable that was not supplied.
    #[error("Prompt template '{template}' has unresolved placeholder '{placeholder}'")]
    Template {
        template: &'static str,
        placeholder: String,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComposeError {
    /// The pipeline stage the error belongs to, when there is one.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            ComposeError::AnalysisParse { .. } => Some(StageName::Analyze),
            ComposeError::LayoutParse { .. } => Some(StageName::Plan),
            ComposeError::QualityParse { .. } => Some(StageName::Audit),
            ComposeError::Inference { stage, .. } | ComposeError::Precondition { stage, .. } => {
                Some(*stage)
            }
            ComposeError::Render { .. } => Some(StageName::Composite),
            _ => None,
        }
    }
}

/// A failure of a single call to the inference service.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum InferenceError {
    /// The provider returned an error (HTTP failure, auth, quota, …).
    #[error("provider error after {attempts} attempt(s): {detail}")]
    Provider { attempts: u32, detail: String },

    /// The call did not finish within the configured timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A non-fatal error for a single slide in the beautify stage.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The inference call failed.
    #[error("Slide {slide}: beautify call failed: {detail}")]
    Inference { slide: usize, detail: String },

    /// The service answered without an image payload.
    #[error("Slide {slide}: model returned no image")]
    NoImage { slide: usize },

    /// The returned image bytes could not be decoded or written.
    #[error("Slide {slide}: returned image unusable: {detail}")]
    BadImage { slide: usize, detail: String },
}

impl SlideError {
    /// The slide index this error refers to.
    pub fn slide(&self) -> usize {
        match self {
            SlideError::Inference { slide, .. }
            | SlideError::NoImage { slide }
            | SlideError::BadImage { slide, .. } => *slide,
        }
    }
}

/// Keep at most `max` characters of a raw model response for error messages.
pub(crate) fn excerpt(raw: &str, max: usize) -> String {
    let mut out: String = raw.chars().take(max).collect();
    if raw.chars().count() > max {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_error_names_stage() {
        let e = ComposeError::Inference {
            stage: StageName::Plan,
            source: InferenceError::Timeout { secs: 30 },
        };
        let msg = e.to_string();
        assert!(msg.starts_with("layout stage"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
        assert_eq!(e.stage(), Some(StageName::Plan));
    }

    #[test]
    fn every_inference_error_is_transport_level() {
        let errors = [
            InferenceError::Provider {
                attempts: 3,
                detail: "HTTP 503".into(),
            },
            InferenceError::Timeout { secs: 120 },
        ];
        for e in errors {
            let msg = match &e {
                InferenceError::Provider { detail, .. } => detail.clone(),
                InferenceError::Timeout { secs } => format!("{secs}s"),
            };
            assert!(e.to_string().contains(&msg), "{e}");
        }
    }

    #[test]
    fn precondition_display() {
        let e = ComposeError::Precondition {
            stage: StageName::Composite,
            missing: "a layout plan",
        };
        assert_eq!(e.to_string(), "composite stage invoked without a layout plan");
    }

    #[test]
    fn parse_errors_map_to_their_stage() {
        let a = ComposeError::AnalysisParse {
            detail: "x".into(),
            excerpt: String::new(),
        };
        let q = ComposeError::QualityParse {
            detail: "x".into(),
            excerpt: String::new(),
        };
        assert_eq!(a.stage(), Some(StageName::Analyze));
        assert_eq!(q.stage(), Some(StageName::Audit));
        assert_eq!(ComposeError::Internal("boom".into()).stage(), None);
    }

    #[test]
    fn slide_error_reports_index() {
        let e = SlideError::NoImage { slide: 4 };
        assert_eq!(e.slide(), 4);
        assert!(e.to_string().contains("Slide 4"));
    }

    #[test]
    fn excerpt_truncates() {
        assert_eq!(excerpt("abcdef", 3), "abc…");
        assert_eq!(excerpt("ab", 3), "ab");
    }
}
