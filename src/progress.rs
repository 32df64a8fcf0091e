//! Progress-callback trait for stage and per-slide pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a run moves through its stages and slides.
//!
//! # Example
//!
//! ```rust
//! use edgequake_carousel::{PipelineConfig, PipelineProgressCallback, StageName};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: StageName, elapsed_ms: u64) {
//!         let n = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{stage} done in {elapsed_ms}ms ({n}/5)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(StageCounter { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::state::StageName;
use std::sync::Arc;

/// Called by the pipeline as a run progresses.
///
/// Implementations must be `Send + Sync`: slides are composited on the
/// blocking pool and a config may be shared by concurrent runs. All methods
/// default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: StageName) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: StageName, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once the layout plan is known.
    ///
    /// # Arguments
    /// * `total_slides` — number of slides the run will produce
    fn on_plan_ready(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called when a slide's base image has been written.
    fn on_slide_composited(&self, index: usize, total_slides: usize) {
        let _ = (index, total_slides);
    }

    /// Called when a slide's final image is settled.
    ///
    /// # Arguments
    /// * `index`        — 0-based slide index
    /// * `total_slides` — number of slides
    /// * `edited`       — `true` when the image came from a model edit,
    ///   `false` when the slide needed no edit
    fn on_slide_beautified(&self, index: usize, total_slides: usize, edited: bool) {
        let _ = (index, total_slides, edited);
    }

    /// Called when a slide's edit failed and it fell back to its base image.
    fn on_slide_fallback(&self, index: usize, total_slides: usize, reason: &str) {
        let _ = (index, total_slides, reason);
    }

    /// Called once after the audit verdict is known.
    fn on_pipeline_complete(&self, total_slides: usize, passed: bool) {
        let _ = (total_slides, passed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        stages: AtomicUsize,
        edited: AtomicUsize,
        fallbacks: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_complete(&self, _stage: StageName, _elapsed_ms: u64) {
            self.stages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_beautified(&self, _index: usize, _total: usize, edited: bool) {
            if edited {
                self.edited.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_slide_fallback(&self, _index: usize, _total: usize, _reason: &str) {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(StageName::Analyze);
        cb.on_plan_ready(4);
        cb.on_slide_composited(0, 4);
        cb.on_slide_beautified(0, 4, true);
        cb.on_slide_fallback(1, 4, "timeout");
        cb.on_pipeline_complete(4, true);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        for stage in StageName::ORDER {
            tracker.on_stage_complete(stage, 1);
        }
        tracker.on_slide_beautified(0, 3, true);
        tracker.on_slide_beautified(1, 3, false);
        tracker.on_slide_fallback(2, 3, "no image");

        assert_eq!(tracker.stages.load(Ordering::SeqCst), 5);
        assert_eq!(tracker.edited.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_crosses_threads() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        let handle = std::thread::spawn(move || cb.on_slide_composited(1, 2));
        handle.join().unwrap();
    }
}
