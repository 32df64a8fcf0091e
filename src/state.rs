//! The accumulating state record threaded through the five stages.
//!
//! Stages read a `&PipelineState` and return a [`StateUpdate`]; the
//! orchestrator folds updates in with [`PipelineState::apply`]. Inputs are
//! set once in [`PipelineState::new`] and cannot appear in an update, so a
//! stage can be exercised on its own with a hand-built partial state.

use crate::model::{ContentBlock, LayoutPlan, ScreenshotInfo};
use crate::output::{ProcessedSlide, QualityReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Analyze,
    Plan,
    Composite,
    Beautify,
    Audit,
}

impl StageName {
    pub const ORDER: [StageName; 5] = [
        StageName::Analyze,
        StageName::Plan,
        StageName::Composite,
        StageName::Beautify,
        StageName::Audit,
    ];
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageName::Analyze => "analysis",
            StageName::Plan => "layout",
            StageName::Composite => "composite",
            StageName::Beautify => "beautify",
            StageName::Audit => "audit",
        })
    }
}

/// State of one pipeline run. Owned by a single orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    content: String,
    screenshots: Vec<PathBuf>,
    requirements: Option<String>,

    pub content_blocks: Option<Vec<ContentBlock>>,
    pub screenshot_analysis: Option<Vec<ScreenshotInfo>>,
    pub content_type: Option<String>,
    pub theme: Option<String>,
    pub suggested_style: Option<String>,
    pub layout_plan: Option<LayoutPlan>,
    pub base_slides: Option<Vec<ProcessedSlide>>,
    pub beautified_slides: Option<Vec<ProcessedSlide>>,
    pub quality_report: Option<QualityReport>,
}

impl PipelineState {
    pub fn new(
        content: impl Into<String>,
        screenshots: Vec<PathBuf>,
        requirements: Option<String>,
    ) -> Self {
        Self {
            content: content.into(),
            screenshots,
            requirements,
            ..Self::default()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn screenshots(&self) -> &[PathBuf] {
        &self.screenshots
    }

    pub fn requirements(&self) -> Option<&str> {
        self.requirements.as_deref()
    }

    /// Merge a stage's partial update, returning the new state.
    ///
    /// Fields absent from the update keep their current value.
    pub fn apply(self, update: StateUpdate) -> Self {
        Self {
            content: self.content,
            screenshots: self.screenshots,
            requirements: self.requirements,
            content_blocks: update.content_blocks.or(self.content_blocks),
            screenshot_analysis: update.screenshot_analysis.or(self.screenshot_analysis),
            content_type: update.content_type.or(self.content_type),
            theme: update.theme.or(self.theme),
            suggested_style: update.suggested_style.or(self.suggested_style),
            layout_plan: update.layout_plan.or(self.layout_plan),
            base_slides: update.base_slides.or(self.base_slides),
            beautified_slides: update.beautified_slides.or(self.beautified_slides),
            quality_report: update.quality_report.or(self.quality_report),
        }
    }
}

/// A partial update produced by one stage.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub content_blocks: Option<Vec<ContentBlock>>,
    pub screenshot_analysis: Option<Vec<ScreenshotInfo>>,
    pub content_type: Option<String>,
    pub theme: Option<String>,
    pub suggested_style: Option<String>,
    pub layout_plan: Option<LayoutPlan>,
    pub base_slides: Option<Vec<ProcessedSlide>>,
    pub beautified_slides: Option<Vec<ProcessedSlide>>,
    pub quality_report: Option<QualityReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_inputs_and_unset_fields() {
        let state = PipelineState::new("hello", vec!["a.png".into()], Some("short".into()));
        let state = state.apply(StateUpdate {
            theme: Some("sleep".into()),
            ..Default::default()
        });
        let state = state.apply(StateUpdate {
            content_type: Some("tips".into()),
            ..Default::default()
        });

        assert_eq!(state.content(), "hello");
        assert_eq!(state.screenshots().len(), 1);
        assert_eq!(state.requirements(), Some("short"));
        assert_eq!(state.theme.as_deref(), Some("sleep"));
        assert_eq!(state.content_type.as_deref(), Some("tips"));
        assert!(state.layout_plan.is_none());
    }

    #[test]
    fn stage_names_display_in_order() {
        let names: Vec<String> = StageName::ORDER.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["analysis", "layout", "composite", "beautify", "audit"]);
    }
}
