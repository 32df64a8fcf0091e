//! Top-level orchestration: inputs → five stages → [`PipelineOutput`].
//!
//! A run owns one [`PipelineState`]. Each stage is driven through an adapter
//! that reads the state, checks that what it needs is there, calls the stage
//! and returns a [`StateUpdate`]; the run folds the updates in. Stages are
//! strictly sequential. The output directory is only created once
//! compositing starts, so a run that fails during analysis or planning
//! leaves nothing on disk.

use crate::config::PipelineConfig;
use crate::error::ComposeError;
use crate::output::{PipelineOutput, PipelineStats};
use crate::pipeline::inference::{InferenceService, LlmInference};
use crate::pipeline::{analyze, audit, beautify, composite, input, plan};
use crate::state::{PipelineState, StageName, StateUpdate};
use crate::style::VisualStyle;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Turn `content` and `screenshots` into a finished carousel in `output_dir`.
///
/// `screenshots` are local paths or `http(s)://` URLs, in the order the
/// analysis should see them. `style` overrides the analyser's suggestion.
///
/// # Errors
/// Returns `Err(ComposeError)` for fatal errors only:
/// - empty content, no screenshots, unreadable screenshot
/// - no usable inference provider
/// - inference or malformed response in analysis, layout or audit
/// - a compositing or write failure
///
/// A failed beautify call is *not* fatal; the slide keeps its base image
/// and is counted in [`PipelineStats::fallback_slides`].
pub async fn run_pipeline(
    content: &str,
    screenshots: &[impl AsRef<str>],
    requirements: Option<&str>,
    style: Option<VisualStyle>,
    output_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ComposeError> {
    let total_start = Instant::now();
    let output_dir = output_dir.as_ref();
    config.validate()?;

    if content.trim().is_empty() {
        return Err(ComposeError::InvalidInput("content is empty".into()));
    }
    if screenshots.is_empty() {
        return Err(ComposeError::InvalidInput(
            "at least one screenshot is required".into(),
        ));
    }
    info!(
        "Starting carousel run: {} chars, {} screenshot(s) → {}",
        content.len(),
        screenshots.len(),
        output_dir.display()
    );

    // ── Inputs and services ──────────────────────────────────────────────
    let inputs: Vec<String> = screenshots.iter().map(|s| s.as_ref().to_string()).collect();
    let resolved = input::resolve_screenshots(&inputs, config.download_timeout_secs).await?;
    let services = Services::resolve(config)?;

    let mut state = PipelineState::new(
        content,
        resolved.paths().to_vec(),
        requirements.map(str::to_string),
    );
    let mut stats = PipelineStats::default();

    // ── Stages ───────────────────────────────────────────────────────────
    let started = begin(StageName::Analyze, config);
    let update = analyze_stage(&state, services.text.as_ref(), config, &mut stats).await?;
    stats.analyze_duration_ms = finish(StageName::Analyze, started, config);
    state = state.apply(update);

    let started = begin(StageName::Plan, config);
    let update = plan_stage(&state, services.text.as_ref(), style, config, &mut stats).await?;
    stats.plan_duration_ms = finish(StageName::Plan, started, config);
    state = state.apply(update);

    let started = begin(StageName::Composite, config);
    let update = composite_stage(&state, output_dir, config).await?;
    stats.composite_duration_ms = finish(StageName::Composite, started, config);
    state = state.apply(update);

    let started = begin(StageName::Beautify, config);
    let update =
        beautify_stage(&state, services.image.as_ref(), output_dir, config, &mut stats).await?;
    stats.beautify_duration_ms = finish(StageName::Beautify, started, config);
    state = state.apply(update);

    let started = begin(StageName::Audit, config);
    let update = audit_stage(&state, services.text.as_ref(), config, &mut stats).await?;
    stats.audit_duration_ms = finish(StageName::Audit, started, config);
    state = state.apply(update);

    // ── Assemble ─────────────────────────────────────────────────────────
    let (Some(slides), Some(base_slides), Some(quality_report)) = (
        state.beautified_slides,
        state.base_slides,
        state.quality_report,
    ) else {
        return Err(ComposeError::Internal(
            "run finished without final slides or a quality report".into(),
        ));
    };

    stats.total_slides = slides.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Carousel complete: {} slides ({} edited, {} unchanged, {} fell back), audit {}, {}ms total",
        stats.total_slides,
        stats.beautified_slides,
        stats.passthrough_slides,
        stats.fallback_slides,
        if quality_report.overall_passed { "passed" } else { "flagged issues" },
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(stats.total_slides, quality_report.overall_passed);
    }

    // Keep downloaded screenshots alive until every stage has read them.
    drop(resolved);

    Ok(PipelineOutput {
        slides,
        base_slides,
        quality_report,
        stats,
    })
}

/// Synchronous wrapper around [`run_pipeline`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_pipeline_sync(
    content: &str,
    screenshots: &[impl AsRef<str>],
    requirements: Option<&str>,
    style: Option<VisualStyle>,
    output_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ComposeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ComposeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(
            content,
            screenshots,
            requirements,
            style,
            output_dir,
            config,
        ))
}

// ── Stage adapters ───────────────────────────────────────────────────────

/// Analysis: needs only the run inputs.
pub async fn analyze_stage(
    state: &PipelineState,
    service: &dyn InferenceService,
    config: &PipelineConfig,
    stats: &mut PipelineStats,
) -> Result<StateUpdate, ComposeError> {
    if state.screenshots().is_empty() {
        return Err(ComposeError::Precondition {
            stage: StageName::Analyze,
            missing: "screenshots",
        });
    }
    let analysis = analyze::analyze(
        service,
        state.content(),
        state.screenshots(),
        state.requirements(),
        config,
    )
    .await?;
    stats.total_input_tokens += analysis.input_tokens;
    stats.total_output_tokens += analysis.output_tokens;

    Ok(StateUpdate {
        content_blocks: Some(analysis.content_blocks),
        screenshot_analysis: Some(analysis.screenshots),
        content_type: Some(analysis.content_type),
        theme: Some(analysis.theme),
        suggested_style: Some(analysis.suggested_style),
        ..Default::default()
    })
}

/// Layout: needs the full analysis.
pub async fn plan_stage(
    state: &PipelineState,
    service: &dyn InferenceService,
    style: Option<VisualStyle>,
    config: &PipelineConfig,
    stats: &mut PipelineStats,
) -> Result<StateUpdate, ComposeError> {
    let (Some(blocks), Some(screenshots), Some(content_type), Some(theme)) = (
        state.content_blocks.as_deref(),
        state.screenshot_analysis.as_deref(),
        state.content_type.as_deref(),
        state.theme.as_deref(),
    ) else {
        return Err(ComposeError::Precondition {
            stage: StageName::Plan,
            missing: "a content analysis",
        });
    };

    let effective = VisualStyle::resolve(
        style,
        state.suggested_style.as_deref(),
        config.default_style,
    );
    debug!("Effective style: {}", effective);

    let outcome = plan::plan(service, blocks, screenshots, content_type, theme, effective).await?;
    stats.total_input_tokens += outcome.input_tokens;
    stats.total_output_tokens += outcome.output_tokens;
    if let Some(ref cb) = config.progress_callback {
        cb.on_plan_ready(outcome.plan.slides.len());
    }

    Ok(StateUpdate {
        layout_plan: Some(outcome.plan),
        ..Default::default()
    })
}

/// Compositing: needs the plan and the screenshots it points at.
pub async fn composite_stage(
    state: &PipelineState,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<StateUpdate, ComposeError> {
    let (Some(layout), Some(screenshots)) =
        (state.layout_plan.as_ref(), state.screenshot_analysis.as_deref())
    else {
        return Err(ComposeError::Precondition {
            stage: StageName::Composite,
            missing: "a layout plan",
        });
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| ComposeError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let slides = composite::render(layout, screenshots, output_dir, config).await?;
    Ok(StateUpdate {
        base_slides: Some(slides),
        ..Default::default()
    })
}

/// Beautify: needs the base slides and the plan they were drawn from.
pub async fn beautify_stage(
    state: &PipelineState,
    service: &dyn InferenceService,
    output_dir: &Path,
    config: &PipelineConfig,
    stats: &mut PipelineStats,
) -> Result<StateUpdate, ComposeError> {
    let (Some(bases), Some(layout)) = (state.base_slides.as_deref(), state.layout_plan.as_ref())
    else {
        return Err(ComposeError::Precondition {
            stage: StageName::Beautify,
            missing: "base slides",
        });
    };

    let result = beautify::beautify(service, bases, layout, output_dir, config).await?;
    stats.beautified_slides = result.beautified;
    stats.passthrough_slides = result.passthrough;
    stats.fallback_slides = result.fallbacks.len();
    stats.total_input_tokens += result.input_tokens;
    stats.total_output_tokens += result.output_tokens;

    Ok(StateUpdate {
        beautified_slides: Some(result.slides),
        ..Default::default()
    })
}

/// Audit: needs the final slides.
pub async fn audit_stage(
    state: &PipelineState,
    service: &dyn InferenceService,
    config: &PipelineConfig,
    stats: &mut PipelineStats,
) -> Result<StateUpdate, ComposeError> {
    let Some(slides) = state.beautified_slides.as_deref() else {
        return Err(ComposeError::Precondition {
            stage: StageName::Audit,
            missing: "final slides",
        });
    };

    let outcome = audit::audit(service, slides, state.content(), config).await?;
    stats.total_input_tokens += outcome.input_tokens;
    stats.total_output_tokens += outcome.output_tokens;

    Ok(StateUpdate {
        quality_report: Some(outcome.report),
        ..Default::default()
    })
}

fn begin(stage: StageName, config: &PipelineConfig) -> Instant {
    info!("Stage {} started", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    Instant::now()
}

fn finish(stage: StageName, started: Instant, config: &PipelineConfig) -> u64 {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!("Stage {} finished in {}ms", stage, elapsed_ms);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed_ms);
    }
    elapsed_ms
}

// ── Services ─────────────────────────────────────────────────────────────

/// The inference services a run talks to.
struct Services {
    /// Analysis, layout and audit.
    text: Arc<dyn InferenceService>,
    /// Beautify edits.
    image: Arc<dyn InferenceService>,
}

impl Services {
    fn resolve(config: &PipelineConfig) -> Result<Self, ComposeError> {
        let text: Arc<dyn InferenceService> = match config.inference {
            Some(ref svc) => Arc::clone(svc),
            None => Arc::new(LlmInference::new(resolve_provider(config)?, config)),
        };

        let image: Arc<dyn InferenceService> = match (&config.image_inference, &config.image_model) {
            (Some(svc), _) => Arc::clone(svc),
            (None, Some(model)) => {
                let name = image_provider_name(config);
                debug!("Beautify uses {}/{}", name, model);
                Arc::new(LlmInference::new(create_vision_provider(&name, model)?, config))
            }
            (None, None) => Arc::clone(&text),
        };

        Ok(Self { text, image })
    }
}

/// Provider for a separate image model: the configured one, else the
/// environment's, else OpenAI.
fn image_provider_name(config: &PipelineConfig) -> String {
    if let Some(ref name) = config.provider_name {
        return name.clone();
    }
    match std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        Ok(p) if !p.is_empty() => p,
        _ => "openai".to_string(),
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ComposeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ComposeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`, `config.model`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **`OPENAI_API_KEY`** present → OpenAI.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ComposeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ComposeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adapters_check_preconditions() {
        let state = PipelineState::new("text", vec!["a.png".into()], None);
        let config = PipelineConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("never-created");

        let err = composite_stage(&state, &out, &config).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Precondition { stage: StageName::Composite, .. }
        ));
        assert!(!out.exists());

        let mut stats = PipelineStats::default();
        struct Unused;
        #[async_trait::async_trait]
        impl InferenceService for Unused {
            async fn infer(
                &self,
                _: crate::pipeline::inference::InferenceRequest,
            ) -> Result<crate::pipeline::inference::InferenceResponse, crate::error::InferenceError>
            {
                unreachable!("adapter must not call the service")
            }
        }
        let err = plan_stage(&state, &Unused, None, &config, &mut stats).await.unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Plan));
        let err = beautify_stage(&state, &Unused, &out, &config, &mut stats)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "beautify stage invoked without base slides");
        let err = audit_stage(&state, &Unused, &config, &mut stats).await.unwrap_err();
        assert_eq!(err.stage(), Some(StageName::Audit));
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = PipelineConfig::default();

        let err = run_pipeline("  ", &["a.png"], None, None, &out, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidInput(_)));

        let none: [&str; 0] = [];
        let err = run_pipeline("text", &none, None, None, &out, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidInput(_)));
        assert!(!out.exists());
    }

    #[test]
    fn invalid_config_is_rejected_by_sync_wrapper() {
        let config = PipelineConfig {
            render_concurrency: 0,
            ..Default::default()
        };
        let err = run_pipeline_sync("text", &["a.png"], None, None, "out", &config).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidConfig(_)));
    }
}
