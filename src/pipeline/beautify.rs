//! Style beautification: base slides → final slides, one model edit each.
//!
//! Slides are processed strictly in index order as a left fold over a
//! [`StyleChain`]. The chain carries the last *genuinely* edited slide,
//! which is sent along with the next edit as a style reference so the
//! carousel keeps one look. A slide that needs no edit, or whose edit
//! failed, never becomes the reference.
//!
//! Failures here are never fatal: the slide's base image is copied to its
//! final path and the failure is recorded as a [`SlideError`]. Only a
//! failure to write an output file aborts the stage.

use crate::config::PipelineConfig;
use crate::error::{ComposeError, SlideError};
use crate::model::{CanvasSize, LayoutPlan, SlideLayout};
use crate::output::{final_file_name, ProcessedSlide};
use crate::pipeline::encode;
use crate::pipeline::inference::{InferenceRequest, InferenceService};
use crate::prompts::{describe_annotation, describe_text_layer, BEAUTIFY_PROMPT, REFERENCE_NOTE};
use crate::state::StageName;
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of the beautify stage.
#[derive(Debug, Clone, Default)]
pub struct BeautifyResult {
    /// One final slide per base slide, same indices, same order.
    pub slides: Vec<ProcessedSlide>,
    pub beautified: usize,
    pub passthrough: usize,
    pub fallbacks: Vec<SlideError>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Accumulator of the beautify fold.
#[derive(Debug, Default)]
pub struct StyleChain {
    /// Final image of the last slide that was actually edited.
    pub reference: Option<PathBuf>,
    result: BeautifyResult,
}

/// What happened to one slide.
enum Step {
    /// Nothing to draw; the base was copied.
    Passthrough(ProcessedSlide),
    /// The model's image was written as the final slide.
    Edited(ProcessedSlide),
    /// The edit failed; the base was copied.
    Fallback(ProcessedSlide, SlideError),
}

impl StyleChain {
    fn step(mut self, step: Step, tokens: (u64, u64)) -> Self {
        self.result.input_tokens += tokens.0;
        self.result.output_tokens += tokens.1;
        match step {
            Step::Passthrough(slide) => {
                self.result.passthrough += 1;
                self.result.slides.push(slide);
            }
            Step::Edited(slide) => {
                self.result.beautified += 1;
                self.reference = Some(slide.path.clone());
                self.result.slides.push(slide);
            }
            Step::Fallback(slide, err) => {
                self.result.fallbacks.push(err);
                self.result.slides.push(slide);
            }
        }
        self
    }

    fn finish(self) -> BeautifyResult {
        self.result
    }
}

/// Beautify every base slide, in index order.
pub async fn beautify(
    service: &dyn InferenceService,
    base_slides: &[ProcessedSlide],
    plan: &LayoutPlan,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<BeautifyResult, ComposeError> {
    let total = base_slides.len();
    info!("Beautifying {} slide(s)", total);

    let mut chain = StyleChain::default();
    for base in base_slides {
        let layout = plan
            .slides
            .iter()
            .find(|s| s.index == base.index)
            .ok_or(ComposeError::Precondition {
                stage: StageName::Beautify,
                missing: "a layout for every base slide",
            })?;
        let final_path = output_dir.join(final_file_name(base.index));

        if layout.is_plain() {
            copy_base(base, &final_path).await?;
            debug!("Slide {} has nothing to draw; copied base", base.index);
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_beautified(base.index, total, false);
            }
            chain = chain.step(Step::Passthrough(finalised(base, final_path)), (0, 0));
            continue;
        }

        let attempt = edit_slide(
            service,
            base,
            layout,
            plan.canvas,
            chain.reference.as_deref(),
            total,
            config,
        )
        .await;

        chain = match attempt {
            Ok((img, tokens)) => {
                write_final(img, &final_path).await?;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_beautified(base.index, total, true);
                }
                chain.step(Step::Edited(finalised(base, final_path)), tokens)
            }
            Err((err, tokens)) => {
                warn!("{} — keeping base image", err);
                copy_base(base, &final_path).await?;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_fallback(base.index, total, &err.to_string());
                }
                chain.step(Step::Fallback(finalised(base, final_path), err), tokens)
            }
        };
    }

    let result = chain.finish();
    info!(
        "Beautify: {} edited, {} unchanged, {} fell back",
        result.beautified,
        result.passthrough,
        result.fallbacks.len()
    );
    Ok(result)
}

type EditOutcome = Result<(DynamicImage, (u64, u64)), (SlideError, (u64, u64))>;

async fn edit_slide(
    service: &dyn InferenceService,
    base: &ProcessedSlide,
    layout: &SlideLayout,
    canvas: CanvasSize,
    reference: Option<&Path>,
    total: usize,
    config: &PipelineConfig,
) -> EditOutcome {
    let slide = base.index;
    let bad = |detail: String| (SlideError::BadImage { slide, detail }, (0, 0));

    let images = prepare_images(
        base.path.clone(),
        reference.map(Path::to_path_buf),
        config.beautify_max_dimension,
        config.reference_max_dimension,
    )
    .await
    .map_err(|e| bad(format!("cannot prepare inputs: {e}")))?;

    let prompt = BEAUTIFY_PROMPT
        .render(&[
            ("slide_number", &(slide + 1).to_string()),
            ("total_slides", &total.to_string()),
            ("canvas", &canvas.to_string()),
            ("reference_note", if images.len() > 1 { REFERENCE_NOTE } else { "" }),
            ("instructions", &edit_instructions(layout)),
        ])
        .map_err(|e| bad(e.to_string()))?;

    let response = service
        .infer(InferenceRequest::image_edit(prompt, images))
        .await
        .map_err(|e| {
            (
                SlideError::Inference {
                    slide,
                    detail: e.to_string(),
                },
                (0, 0),
            )
        })?;
    let tokens = (response.input_tokens, response.output_tokens);

    let bytes = response
        .image
        .ok_or((SlideError::NoImage { slide }, tokens))?;
    let img = image::load_from_memory(&bytes).map_err(|e| {
        (
            SlideError::BadImage {
                slide,
                detail: e.to_string(),
            },
            tokens,
        )
    })?;

    let img = if (img.width(), img.height()) != (base.width, base.height) {
        debug!(
            "Slide {}: resizing edit {}x{} → {}x{}",
            slide,
            img.width(),
            img.height(),
            base.width,
            base.height
        );
        img.resize_exact(base.width, base.height, FilterType::Lanczos3)
    } else {
        img
    };
    Ok((img, tokens))
}

/// Numbered drawing instructions for one slide.
pub fn edit_instructions(layout: &SlideLayout) -> String {
    layout
        .text_layers
        .iter()
        .map(describe_text_layer)
        .chain(layout.annotations.iter().map(describe_annotation))
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn prepare_images(
    base: PathBuf,
    reference: Option<PathBuf>,
    base_max: u32,
    reference_max: u32,
) -> Result<Vec<ImageData>, String> {
    tokio::task::spawn_blocking(move || -> Result<Vec<ImageData>, String> {
        let load = |p: &Path| image::open(p).map_err(|e| format!("{}: {e}", p.display()));
        let mut images = vec![encode::prepare_png(&load(&base)?, base_max).map_err(|e| e.to_string())?];
        if let Some(r) = reference {
            images.push(encode::prepare_png(&load(&r)?, reference_max).map_err(|e| e.to_string())?);
        }
        Ok(images)
    })
    .await
    .map_err(|e| format!("image preparation task panicked: {e}"))?
}

async fn write_final(img: DynamicImage, path: &Path) -> Result<(), ComposeError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        img.save_with_format(&target, ImageFormat::Png).map_err(|e| match e {
            ImageError::IoError(source) => ComposeError::OutputWriteFailed {
                path: target.clone(),
                source,
            },
            other => ComposeError::Internal(format!("Encoding {} failed: {other}", target.display())),
        })
    })
    .await
    .map_err(|e| ComposeError::Internal(format!("Write task panicked: {e}")))?
}

async fn copy_base(base: &ProcessedSlide, final_path: &Path) -> Result<(), ComposeError> {
    tokio::fs::copy(&base.path, final_path)
        .await
        .map(|_| ())
        .map_err(|source| ComposeError::OutputWriteFailed {
            path: final_path.to_path_buf(),
            source,
        })
}

fn finalised(base: &ProcessedSlide, path: PathBuf) -> ProcessedSlide {
    ProcessedSlide {
        path,
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::model::{
        Anchor, Color, Placement, PlacementSource, ResizeMode, SlideType, TextLayer, TextStyle,
    };
    use crate::pipeline::inference::InferenceResponse;
    use crate::style::VisualStyle;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn png(w: u32, h: u32, c: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(c)))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn layout(index: usize, text: Option<&str>) -> SlideLayout {
        SlideLayout {
            index,
            slide_type: SlideType::TextOnly,
            background_color: Color::WHITE,
            placement: Placement {
                source: PlacementSource::Generate,
                mode: ResizeMode::Fit,
                position: Anchor::Center,
                padding: 60,
                border_radius: 24,
                shadow: true,
            },
            text_layers: text
                .map(|t| {
                    vec![TextLayer {
                        content: t.to_string(),
                        style: TextStyle::Title,
                        position: Anchor::Top,
                        color: None,
                        background_color: None,
                    }]
                })
                .unwrap_or_default(),
            annotations: vec![],
            content_block_index: None,
        }
    }

    fn fixture(dir: &Path, texts: &[Option<&str>]) -> (Vec<ProcessedSlide>, LayoutPlan) {
        let bases = texts
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let path = dir.join(format!("slide_{i:02}_base.png"));
                std::fs::write(&path, png(40, 60, [i as u8 * 10, 0, 0, 255])).unwrap();
                ProcessedSlide { index: i, path, width: 40, height: 60 }
            })
            .collect();
        let plan = LayoutPlan {
            canvas: CanvasSize { width: 40, height: 60 },
            slides: texts.iter().enumerate().map(|(i, t)| layout(i, *t)).collect(),
            color_palette: VisualStyle::Minimal.palette(),
        };
        (bases, plan)
    }

    /// Records (slide number, image count) per call; fails on the listed slides.
    struct Scripted {
        fail_on: Vec<usize>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait]
    impl InferenceService for Scripted {
        async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
            let n: usize = request
                .prompt
                .split("finishing slide ")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .and_then(|s| s.parse().ok())
                .unwrap();
            self.calls.lock().unwrap().push((n, request.images.len()));
            if self.fail_on.contains(&n) {
                return Err(InferenceError::Provider { attempts: 1, detail: "boom".into() });
            }
            Ok(InferenceResponse {
                text: String::new(),
                // Different size on purpose: the stage must resize it back.
                image: Some(png(80, 120, [0, 200, 0, 255])),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    #[tokio::test]
    async fn failed_slide_does_not_become_reference() {
        let dir = tempfile::tempdir().unwrap();
        let (bases, plan) = fixture(dir.path(), &[Some("Cover"), Some("Two"), Some("Three")]);
        let svc = Scripted { fail_on: vec![2], calls: Mutex::new(vec![]) };

        let out = beautify(&svc, &bases, &plan, dir.path(), &PipelineConfig::default())
            .await
            .unwrap();

        // Slide 1 has no reference, slide 2 gets slide 1, slide 3 still gets
        // slide 1 because slide 2 failed.
        assert_eq!(*svc.calls.lock().unwrap(), vec![(1, 1), (2, 2), (3, 2)]);
        assert_eq!(out.beautified, 2);
        assert_eq!(out.fallbacks.len(), 1);
        assert_eq!(out.fallbacks[0].slide(), 1);
        assert_eq!(
            std::fs::read(&out.slides[1].path).unwrap(),
            std::fs::read(&bases[1].path).unwrap()
        );
        let edited = image::open(&out.slides[2].path).unwrap();
        assert_eq!((edited.width(), edited.height()), (40, 60));
        assert_eq!((out.input_tokens, out.output_tokens), (20, 10));
    }

    #[tokio::test]
    async fn plain_slides_skip_the_service() {
        let dir = tempfile::tempdir().unwrap();
        let (bases, plan) = fixture(dir.path(), &[None, Some("Text"), None]);
        let svc = Scripted { fail_on: vec![], calls: Mutex::new(vec![]) };

        let out = beautify(&svc, &bases, &plan, dir.path(), &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(*svc.calls.lock().unwrap(), vec![(2, 1)]);
        assert_eq!(out.passthrough, 2);
        assert_eq!(out.beautified, 1);
        assert_eq!(out.slides.len(), 3);
        assert_eq!(
            std::fs::read(&out.slides[0].path).unwrap(),
            std::fs::read(&bases[0].path).unwrap()
        );
    }

    #[tokio::test]
    async fn total_failure_leaves_bases_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let (bases, plan) = fixture(dir.path(), &[Some("A"), Some("B")]);
        let svc = Scripted { fail_on: vec![1, 2], calls: Mutex::new(vec![]) };

        let out = beautify(&svc, &bases, &plan, dir.path(), &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(out.fallbacks.len(), 2);
        for (f, b) in out.slides.iter().zip(&bases) {
            assert_eq!(f.index, b.index);
            assert_eq!(f.path, dir.path().join(format!("slide_{:02}.png", b.index)));
            assert_eq!(std::fs::read(&f.path).unwrap(), std::fs::read(&b.path).unwrap());
        }
    }

    #[test]
    fn instructions_are_numbered() {
        let mut l = layout(0, Some("Hello"));
        l.annotations.push(crate::model::Annotation {
            annotation_type: crate::model::AnnotationType::Circle,
            target: crate::model::AnnotationTarget::TextMatch { text: "Save".into() },
            label: None,
            color: None,
        });
        let text = edit_instructions(&l);
        assert!(text.starts_with("1. Write \"Hello\""), "{text}");
        assert!(text.contains("\n2. Draw a hand-drawn style circle"), "{text}");
    }
}
