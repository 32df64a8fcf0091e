//! Configuration types for a carousel pipeline run.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. One struct makes it trivial to share a config
//! between concurrent runs and to log exactly what a run was asked to do.

use crate::error::ComposeError;
use crate::pipeline::inference::InferenceService;
use crate::progress::ProgressCallback;
use crate::style::VisualStyle;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one or more pipeline runs.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_carousel::{PipelineConfig, VisualStyle};
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4.1-mini")
///     .default_style(VisualStyle::Warm)
///     .render_concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pre-built inference service for analysis, layout and audit.
    /// Takes precedence over every provider setting below.
    pub inference: Option<Arc<dyn InferenceService>>,

    /// Pre-built inference service for the image-editing beautify calls.
    /// Falls back to the text service when `None` and no `image_model` is set.
    pub image_inference: Option<Arc<dyn InferenceService>>,

    /// Pre-constructed LLM provider, wrapped in the retrying adapter.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "gemini").
    pub provider_name: Option<String>,

    /// Model for analysis, layout and audit. If None, uses provider default.
    pub model: Option<String>,

    /// Model for beautify calls, when it must differ from `model`
    /// (an image-output capable model). Uses the same provider.
    pub image_model: Option<String>,

    /// Sampling temperature for structured calls. Default: 0.4.
    ///
    /// Layout is a creative task, so a little more freedom than transcription
    /// helps, but JSON adherence degrades above ~0.8.
    pub temperature: f32,

    /// Maximum output tokens per call. Default: 4096.
    pub max_tokens: usize,

    /// Transport-level retries per inference call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    ///
    /// Image-editing calls are slow; two minutes covers most providers.
    pub api_timeout_secs: u64,

    /// Longest side of screenshots sent to the analysis call. Default: 1024.
    pub analysis_max_dimension: u32,

    /// JPEG quality (1–100) for analysis images and audit thumbnails. Default: 85.
    pub jpeg_quality: u8,

    /// Longest side of the base slide sent to a beautify call. Default: 1536.
    pub beautify_max_dimension: u32,

    /// Longest side of the previous slide sent as style reference. Default: 768.
    pub reference_max_dimension: u32,

    /// Longest side of the audit thumbnails. Default: 512.
    pub thumbnail_max_dimension: u32,

    /// Slides composited concurrently on the blocking pool. Default: 4.
    pub render_concurrency: usize,

    /// Style used when neither the caller nor the analysis names one.
    pub default_style: VisualStyle,

    /// Download timeout for URL screenshots in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional progress callback for stage and slide events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inference: None,
            image_inference: None,
            provider: None,
            provider_name: None,
            model: None,
            image_model: None,
            temperature: 0.4,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            analysis_max_dimension: 1024,
            jpeg_quality: 85,
            beautify_max_dimension: 1536,
            reference_max_dimension: 768,
            thumbnail_max_dimension: 512,
            render_concurrency: 4,
            default_style: VisualStyle::default(),
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("inference", &self.inference.as_ref().map(|_| "<dyn InferenceService>"))
            .field(
                "image_inference",
                &self.image_inference.as_ref().map(|_| "<dyn InferenceService>"),
            )
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("analysis_max_dimension", &self.analysis_max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("beautify_max_dimension", &self.beautify_max_dimension)
            .field("reference_max_dimension", &self.reference_max_dimension)
            .field("thumbnail_max_dimension", &self.thumbnail_max_dimension)
            .field("render_concurrency", &self.render_concurrency)
            .field("default_style", &self.default_style)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check cross-field constraints. Called by the builder and again at the
    /// start of every run, since fields are public.
    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.render_concurrency == 0 {
            return Err(ComposeError::InvalidConfig(
                "Render concurrency must be ≥ 1".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ComposeError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                self.jpeg_quality
            )));
        }
        for (name, v) in [
            ("analysis_max_dimension", self.analysis_max_dimension),
            ("beautify_max_dimension", self.beautify_max_dimension),
            ("reference_max_dimension", self.reference_max_dimension),
            ("thumbnail_max_dimension", self.thumbnail_max_dimension),
        ] {
            if v < 64 {
                return Err(ComposeError::InvalidConfig(format!(
                    "{name} must be ≥ 64, got {v}"
                )));
            }
        }
        if self.reference_max_dimension > self.beautify_max_dimension {
            return Err(ComposeError::InvalidConfig(
                "reference_max_dimension must not exceed beautify_max_dimension".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn inference(mut self, service: Arc<dyn InferenceService>) -> Self {
        self.config.inference = Some(service);
        self
    }

    pub fn image_inference(mut self, service: Arc<dyn InferenceService>) -> Self {
        self.config.image_inference = Some(service);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn analysis_max_dimension(mut self, px: u32) -> Self {
        self.config.analysis_max_dimension = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn beautify_max_dimension(mut self, px: u32) -> Self {
        self.config.beautify_max_dimension = px;
        self
    }

    pub fn reference_max_dimension(mut self, px: u32) -> Self {
        self.config.reference_max_dimension = px;
        self
    }

    pub fn thumbnail_max_dimension(mut self, px: u32) -> Self {
        self.config.thumbnail_max_dimension = px;
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.render_concurrency = n.max(1);
        self
    }

    pub fn default_style(mut self, style: VisualStyle) -> Self {
        self.config.default_style = style;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ComposeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = PipelineConfig::builder().build().expect("defaults build");
        assert_eq!(c.analysis_max_dimension, 1024);
        assert_eq!(c.jpeg_quality, 85);
        assert_eq!(c.default_style, VisualStyle::Minimal);
    }

    #[test]
    fn setters_clamp() {
        let c = PipelineConfig::builder()
            .temperature(9.0)
            .render_concurrency(0)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.render_concurrency, 1);
        assert_eq!(c.jpeg_quality, 1);
    }

    #[test]
    fn tiny_dimensions_rejected() {
        let err = PipelineConfig::builder()
            .thumbnail_max_dimension(10)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("thumbnail_max_dimension"));
    }

    #[test]
    fn reference_larger_than_base_rejected() {
        let r = PipelineConfig::builder()
            .beautify_max_dimension(512)
            .reference_max_dimension(1024)
            .build();
        assert!(matches!(r, Err(ComposeError::InvalidConfig(_))));
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("PipelineConfig"));
        assert!(s.contains("inference: None"));
    }
}
