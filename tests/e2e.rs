//! End-to-end integration tests for edgequake-carousel.
//!
//! These tests make live LLM API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested. Screenshots are synthesised on the fly; real ones
//! placed in `./test_cases/screenshots/` are used instead when present.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_full_run -- --nocapture

use edgequake_carousel::{
    run_pipeline, ComposeError, PipelineConfig, PipelineProgressCallback, VisualStyle,
};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const CONTENT: &str = "Three ways to get more out of your notes app:\n\
    1. Pin the notes you open every day so they stay at the top.\n\
    2. Use the checklist button to turn any note into a to-do list.\n\
    3. Share a folder with your team instead of sending copies.";

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Real screenshots from `test_cases/screenshots/` if any, else three
/// synthetic phone-sized mockups written to `dir`.
fn screenshots(dir: &Path) -> Vec<String> {
    let real = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/screenshots");
    if let Ok(entries) = std::fs::read_dir(&real) {
        let mut found: Vec<String> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("png" | "jpg" | "jpeg")
                )
            })
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if !found.is_empty() {
            found.sort();
            return found;
        }
    }

    [[245, 245, 250], [230, 240, 255], [240, 250, 235]]
        .iter()
        .enumerate()
        .map(|(i, bg)| {
            let mut img = RgbaImage::from_pixel(390, 844, Rgba([bg[0], bg[1], bg[2], 255]));
            // A toolbar and a few "rows" so the model has something to describe.
            for y in 0..72 {
                for x in 0..390 {
                    img.put_pixel(x, y, Rgba([40, 90, 200, 255]));
                }
            }
            for row in 0..5u32 {
                let top = 120 + row * 110;
                for y in top..top + 80 {
                    for x in 24..366 {
                        img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
                    }
                }
            }
            let path = dir.join(format!("screen_{i}.png"));
            img.save(&path).expect("write synthetic screenshot");
            path.to_string_lossy().into_owned()
        })
        .collect()
}

/// Assert every slide on disk matches the planned canvas.
fn assert_slides_on_disk(paths: &[&Path], context: &str) {
    assert!(!paths.is_empty(), "[{context}] No slides produced");
    let first = image::open(paths[0]).expect("first slide readable");
    for p in paths {
        assert!(p.exists(), "[{context}] Missing {}", p.display());
        let img = image::open(p).unwrap_or_else(|e| panic!("[{context}] {}: {e}", p.display()));
        assert_eq!(
            (img.width(), img.height()),
            (first.width(), first.height()),
            "[{context}] {} differs in size from slide 0",
            p.display()
        );
    }
}

#[derive(Default)]
struct Counter {
    composited: AtomicUsize,
    finished: AtomicUsize,
}

impl PipelineProgressCallback for Counter {
    fn on_slide_composited(&self, _index: usize, _total: usize) {
        self.composited.fetch_add(1, Ordering::SeqCst);
    }
    fn on_slide_beautified(&self, _index: usize, _total: usize, _edited: bool) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
    fn on_slide_fallback(&self, index: usize, _total: usize, reason: &str) {
        println!("slide {index} fell back: {reason}");
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Input validation (no LLM) ────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_screenshot_is_rejected() {
    e2e_skip_unless_enabled!();

    let out = tempfile::tempdir().unwrap();
    let err = run_pipeline(
        CONTENT,
        &["/definitely/not/a/real/screenshot.png"],
        None,
        None,
        out.path(),
        &PipelineConfig::default(),
    )
    .await
    .expect_err("missing screenshot must fail");
    assert!(matches!(err, ComposeError::ScreenshotNotFound { .. }), "{err}");
}

// ── Live runs (need LLM API) ─────────────────────────────────────────────────

/// Full run with whatever provider the environment configures.
#[tokio::test]
async fn test_full_run() {
    e2e_skip_unless_enabled!();

    let inputs = tempfile::tempdir().unwrap();
    let shots = screenshots(inputs.path());
    let out = output_dir("full_run");
    let counter = Arc::new(Counter::default());

    let config = PipelineConfig::builder()
        .max_retries(2)
        .progress_callback(counter.clone())
        .build()
        .expect("valid config");

    let output = run_pipeline(CONTENT, &shots, Some("5 slides max"), None, &out, &config)
        .await
        .expect("pipeline should succeed");

    let n = output.slides.len();
    assert!(n >= 1, "At least one slide");
    assert_eq!(output.base_slides.len(), n, "One base per final slide");
    assert_eq!(counter.composited.load(Ordering::SeqCst), n);
    assert_eq!(counter.finished.load(Ordering::SeqCst), n);
    assert_eq!(
        output.stats.beautified_slides + output.stats.passthrough_slides + output.stats.fallback_slides,
        n
    );
    assert_slides_on_disk(&output.slide_paths(), "full_run");

    println!(
        "{} slide(s), audit passed: {}, tokens in/out: {}/{}",
        n,
        output.quality_report.overall_passed,
        output.stats.total_input_tokens,
        output.stats.total_output_tokens
    );
    for issue in &output.quality_report.issues {
        println!("  issue: {issue}");
    }
}

/// An explicit style overrides the analyzer's suggestion.
#[tokio::test]
async fn test_explicit_style() {
    e2e_skip_unless_enabled!();

    let inputs = tempfile::tempdir().unwrap();
    let shots = screenshots(inputs.path());
    let out = output_dir("dark_style");

    let config = PipelineConfig::builder()
        .max_retries(2)
        .build()
        .expect("valid config");

    let output = run_pipeline(
        CONTENT,
        &shots[..1],
        Some("3 slides"),
        Some(VisualStyle::Dark),
        &out,
        &config,
    )
    .await
    .expect("pipeline should succeed");

    assert_slides_on_disk(&output.slide_paths(), "dark_style");
    let bases: Vec<&Path> = output.base_slides.iter().map(|s| s.path.as_path()).collect();
    assert_slides_on_disk(&bases, "dark_style/base");
}
