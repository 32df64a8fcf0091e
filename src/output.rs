//! Output types returned by the pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One rendered slide on disk.
///
/// Created by the compositor as a base artifact; the beautifier produces a
/// new value at the same index rather than mutating the base one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSlide {
    pub index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Terminal verdict of the audit stage. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QualityReport {
    pub overall_passed: bool,
    pub issues: Vec<String>,
    pub summary: String,
}

/// Everything a completed run hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    /// Final slides in index order (beautified or base fallbacks).
    pub slides: Vec<ProcessedSlide>,
    /// Deterministic base slides, kept for diagnostics.
    pub base_slides: Vec<ProcessedSlide>,
    pub quality_report: QualityReport,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// Paths of the final slides, in order.
    pub fn slide_paths(&self) -> Vec<&Path> {
        self.slides.iter().map(|s| s.path.as_path()).collect()
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total_slides: usize,
    /// Slides whose final image came from a real model edit.
    pub beautified_slides: usize,
    /// Slides that needed no edit (no text, no annotations).
    pub passthrough_slides: usize,
    /// Slides that fell back to their base image after a failed edit.
    pub fallback_slides: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub analyze_duration_ms: u64,
    pub plan_duration_ms: u64,
    pub composite_duration_ms: u64,
    pub beautify_duration_ms: u64,
    pub audit_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Deterministic file name of a slide's base artifact.
pub fn base_file_name(index: usize) -> String {
    format!("slide_{index:02}_base.png")
}

/// Deterministic file name of a slide's final artifact.
pub fn final_file_name(index: usize) -> String {
    format!("slide_{index:02}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_index_derived() {
        assert_eq!(base_file_name(3), "slide_03_base.png");
        assert_eq!(final_file_name(3), "slide_03.png");
        assert_eq!(final_file_name(12), "slide_12.png");
    }

    #[test]
    fn quality_report_decodes_camel_case() {
        let r: QualityReport = serde_json::from_str(
            r#"{"overallPassed":false,"issues":["slide 2 text overflows"],"summary":"close"}"#,
        )
        .unwrap();
        assert!(!r.overall_passed);
        assert_eq!(r.issues.len(), 1);
    }

    #[test]
    fn quality_report_rejects_missing_fields() {
        assert!(serde_json::from_str::<QualityReport>(r#"{"overallPassed":true}"#).is_err());
    }

    #[test]
    fn output_serialises_to_json() {
        let out = PipelineOutput {
            slides: vec![ProcessedSlide {
                index: 0,
                path: "out/slide_00.png".into(),
                width: 1080,
                height: 1440,
            }],
            base_slides: vec![],
            quality_report: QualityReport {
                overall_passed: true,
                issues: vec![],
                summary: "ok".into(),
            },
            stats: PipelineStats::default(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"qualityReport\""));
        assert!(json.contains("\"overallPassed\":true"));
        assert_eq!(out.slide_paths()[0], Path::new("out/slide_00.png"));
    }
}
