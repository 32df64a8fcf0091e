//! # edgequake-carousel
//!
//! Turn a piece of text and a few screenshots into a styled, ordered set of
//! social-media carousel slides using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Asking an image model to draw a whole carousel from scratch gives
//! inconsistent slides and mangled screenshots. This crate splits the work:
//! the model decides *what* goes on each slide, a deterministic compositor
//! places the real screenshots pixel-exactly, and only then does an
//! image-editing model add headlines and annotations on top, one slide at a
//! time, using the previous finished slide as a style reference.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text + screenshots
//!  │
//!  ├─ 1. Analyze    one vision call → content blocks, screenshot roles, style hint
//!  ├─ 2. Plan       one call → per-slide layout (canvas, placement, text, annotations)
//!  ├─ 3. Composite  deterministic base PNGs (CPU-bound, spawn_blocking)
//!  ├─ 4. Beautify   sequential image edits, chained by style reference
//!  └─ 5. Audit      one call over thumbnails → read-only quality verdict
//! ```
//!
//! Analysis, layout and audit failures abort the run. A failed beautify edit
//! never does: that slide keeps its base image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_carousel::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::default();
//!     let output = run_pipeline(
//!         "5 tips to sleep better with the Calm app …",
//!         &["home.png", "settings.png"],
//!         Some("6 slides max"),
//!         None,
//!         "carousel-out",
//!         &config,
//!     )
//!     .await?;
//!     for path in output.slide_paths() {
//!         println!("{}", path.display());
//!     }
//!     eprintln!("audit passed: {}", output.quality_report.overall_passed);
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own model
//!
//! Every stage talks to an [`InferenceService`]. Plug in your own (a
//! cache, a different SDK, a scripted fake in tests) with
//! [`PipelineConfigBuilder::inference`] and
//! [`PipelineConfigBuilder::image_inference`]; otherwise an
//! `edgequake_llm` provider is resolved from the config and environment.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `carousel` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-carousel = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod state;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{ComposeError, InferenceError, SlideError};
pub use model::{
    Anchor, Annotation, AnnotationTarget, AnnotationType, BlockRole, CanvasSize, Color,
    ContentBlock, LayoutPlan, Placement, PlacementSource, ResizeMode, ScreenshotInfo,
    ScreenshotRole, SlideLayout, SlideType, TextLayer, TextStyle,
};
pub use output::{PipelineOutput, PipelineStats, ProcessedSlide, QualityReport};
pub use pipeline::inference::{
    InferenceRequest, InferenceResponse, InferenceService, LlmInference, ResponseModality,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{run_pipeline, run_pipeline_sync};
pub use state::{PipelineState, StageName, StateUpdate};
pub use style::{Palette, VisualStyle};
