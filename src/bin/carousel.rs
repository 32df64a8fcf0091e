//! CLI binary for edgequake-carousel.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_carousel::{
    run_pipeline, PipelineConfig, PipelineOutput, PipelineProgressCallback, ProgressCallback,
    StageName, VisualStyle,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while the model thinks, then one bar that
/// counts composited and beautified slides.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading screenshots…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Switch to the bar style once the slide count is known.
    fn activate_bar(&self, steps: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} steps  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(steps as u64);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: StageName) {
        let message = match stage {
            StageName::Analyze => "Reading content and screenshots…",
            StageName::Plan => "Designing slide layout…",
            StageName::Composite => "Placing screenshots…",
            StageName::Beautify => "Adding text and annotations…",
            StageName::Audit => "Reviewing the carousel…",
        };
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(message);
    }

    fn on_stage_complete(&self, stage: StageName, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_plan_ready(&self, total_slides: usize) {
        self.activate_bar(total_slides * 2);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Planned {total_slides} slides"))
        ));
    }

    fn on_slide_composited(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_slide_beautified(&self, index: usize, total: usize, edited: bool) {
        let what = if edited { "styled" } else { "unchanged" };
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}",
            green("✓"),
            index + 1,
            total,
            dim(what)
        ));
        self.bar.inc(1);
    }

    fn on_slide_fallback(&self, index: usize, total: usize, reason: &str) {
        let msg: String = if reason.chars().count() > 80 {
            reason.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, total_slides: usize, passed: bool) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides written, audit {}",
            if passed { green("✔") } else { cyan("⚠") },
            bold(&total_slides.to_string()),
            if passed { green("passed") } else { red("flagged issues") },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text from a file, two screenshots
  carousel --content-file post.md home.png settings.png

  # Text inline, explicit style and output directory
  carousel -c "5 tips to sleep better" --style warm -o out/ home.png

  # Text from stdin, screenshots from URLs
  cat post.md | carousel --content-file - https://example.com/a.png

  # Separate image-editing model for the beautify step
  carousel --content-file post.md --image-model gpt-image-1 home.png

  # JSON output (final slides, base slides, audit, stats)
  carousel --json --content-file post.md home.png > result.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides --verbose)

OUTPUT:
  slide_NN_base.png  deterministic composite before styling
  slide_NN.png       final slide (styled, or a copy of the base on failure)
"#;

/// Turn text and screenshots into social-media carousel slides.
#[derive(Parser, Debug)]
#[command(
    name = "carousel",
    version,
    about = "Turn text and screenshots into social-media carousel slides using Vision LLMs",
    long_about = "Turn a piece of text and a few app screenshots into an ordered set of styled \
carousel slides. Screenshots are placed deterministically; a vision model plans the layout and \
adds headlines and annotations. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and \
any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Screenshot files or HTTP/HTTPS URLs, in order.
    #[arg(required = true)]
    screenshots: Vec<String>,

    /// Post text, inline.
    #[arg(short, long, conflicts_with = "content_file")]
    content: Option<String>,

    /// Read the post text from this file ("-" for stdin).
    #[arg(long, env = "CAROUSEL_CONTENT_FILE")]
    content_file: Option<PathBuf>,

    /// Free-form extra requirements (e.g. "6 slides max, square").
    #[arg(short, long, env = "CAROUSEL_REQUIREMENTS")]
    requirements: Option<String>,

    /// Directory for slide images.
    #[arg(short, long, env = "CAROUSEL_OUTPUT_DIR", default_value = "carousel-out")]
    output_dir: PathBuf,

    /// Visual style; overrides the analyser's suggestion.
    #[arg(long, env = "CAROUSEL_STYLE", value_enum)]
    style: Option<StyleArg>,

    /// LLM model ID for analysis, layout and audit.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Image-capable model for the beautify edits (same provider).
    #[arg(long, env = "CAROUSEL_IMAGE_MODEL")]
    image_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Slides composited concurrently.
    #[arg(long, env = "CAROUSEL_RENDER_CONCURRENCY", default_value_t = 4)]
    render_concurrency: usize,

    /// Max LLM output tokens per call.
    #[arg(long, env = "CAROUSEL_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CAROUSEL_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Transport retries per call.
    #[arg(long, env = "CAROUSEL_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "CAROUSEL_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout for URL screenshots, in seconds.
    #[arg(long, env = "CAROUSEL_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Output structured JSON (PipelineOutput) on stdout.
    #[arg(long, env = "CAROUSEL_JSON")]
    json: bool,

    /// Exit with status 2 when the quality audit flags issues.
    #[arg(long, env = "CAROUSEL_STRICT")]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "CAROUSEL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CAROUSEL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CAROUSEL_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Minimal,
    Vibrant,
    Professional,
    Warm,
    Dark,
}

impl From<StyleArg> for VisualStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Minimal => VisualStyle::Minimal,
            StyleArg::Vibrant => VisualStyle::Vibrant,
            StyleArg::Professional => VisualStyle::Professional,
            StyleArg::Warm => VisualStyle::Warm,
            StyleArg::Dark => VisualStyle::Dark,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar; keep them quiet
    // unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let content = read_content(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = run_pipeline(
        &content,
        &cli.screenshots,
        cli.requirements.as_deref(),
        cli.style.map(Into::into),
        &cli.output_dir,
        &config,
    )
    .await
    .context("Carousel generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    if cli.strict && !output.quality_report.overall_passed {
        std::process::exit(2);
    }
    Ok(())
}

/// The post text from `--content`, `--content-file`, or `--content-file -`.
async fn read_content(cli: &Cli) -> Result<String> {
    if let Some(ref text) = cli.content {
        return Ok(text.clone());
    }
    match cli.content_file {
        Some(ref path) if path.as_os_str() == "-" => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read content from stdin")?;
            Ok(buf)
        }
        Some(ref path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read content from {:?}", path)),
        None => anyhow::bail!("Provide the post text with --content or --content-file"),
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .render_concurrency(cli.render_concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = cli.image_model {
        builder = builder.image_model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &PipelineOutput, progress_shown: bool) {
    let stats = &output.stats;
    if !progress_shown {
        eprintln!(
            "Generated {} slides in {}ms ({} styled, {} unchanged, {} fell back)",
            stats.total_slides,
            stats.total_duration_ms,
            stats.beautified_slides,
            stats.passthrough_slides,
            stats.fallback_slides
        );
    }
    for path in output.slide_paths() {
        println!("{}", path.display());
    }

    let report = &output.quality_report;
    eprintln!("   {}", dim(&report.summary));
    for issue in &report.issues {
        eprintln!("   {} {}", cyan("•"), issue);
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {}ms total",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
    );
}
