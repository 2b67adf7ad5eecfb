//! Document generation: step narration + screenshot references → Markdown,
//! plus the JSON metadata sidecar.
//!
//! The output is fully determined by its inputs. Steps are always emitted in
//! ascending numeric order, and the only time-dependent text is the
//! generation timestamp passed in by the caller.

use crate::config::{ConversionConfig, ImageFormat};
use crate::error::Mht2MdError;
use crate::output::{
    ConversionInfo, ConversionMetadata, ConversionWarning, MetadataFiles, MetadataStatistics,
    CONVERTER_VERSION,
};
use crate::pipeline::steps::StepRecord;
use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inputs to [`render_markdown`].
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    /// Input file stem; also the document title.
    pub base_name: &'a str,
    /// Input filename including extension.
    pub original_filename: &'a str,
    pub steps: &'a StepRecord,
    pub image_count: usize,
    pub image_format: ImageFormat,
    pub generated_at: DateTime<Local>,
}

/// Render the Markdown document.
pub fn render_markdown(doc: &DocumentInput<'_>) -> String {
    let generated = doc.generated_at.format(TIMESTAMP_FORMAT).to_string();
    let mut lines: Vec<String> = vec![
        format!("# {} - Step Recorder Documentation", doc.base_name),
        String::new(),
        format!("**Generated:** {generated}  "),
        format!("**Original File:** `{}`  ", doc.original_filename),
        format!("**Total Steps:** {}  ", doc.steps.len()),
        format!("**Total Images:** {}  ", doc.image_count),
        format!("**Image Format:** {}", doc.image_format.label()),
        String::new(),
        "---".into(),
        String::new(),
        "## Table of Contents".into(),
        String::new(),
    ];

    for (number, _) in doc.steps.iter() {
        lines.push(format!("- [Step {number}](#step-{number})"));
    }
    lines.extend([String::new(), "---".into(), String::new()]);

    for (number, text) in doc.steps.iter() {
        lines.extend([
            format!("## Step {number}"),
            String::new(),
            format!("**Action:** {text}"),
            String::new(),
            "### Screenshot:".into(),
            format!(
                "![Step {number} Screenshot]({})",
                doc.image_format.screenshot_name(number)
            ),
            String::new(),
            "---".into(),
            String::new(),
        ]);
    }

    lines.extend([
        "## About This Document".into(),
        String::new(),
        format!(
            "This documentation was automatically generated from a Step Recorder capture \
             using **mht2md v{CONVERTER_VERSION}**."
        ),
        String::new(),
        format!("- **Generated on:** {generated}"),
        format!("- **Converter:** mht2md {CONVERTER_VERSION}"),
        String::new(),
    ]);

    lines.join("\n")
}

/// Warnings for steps without a screenshot and screenshots without a step.
///
/// `images` pairs each written screenshot's step number with its filename.
pub fn correlation_warnings(
    steps: &StepRecord,
    images: &[(u32, String)],
    format: ImageFormat,
) -> Vec<ConversionWarning> {
    let mut warnings = Vec::new();
    for number in steps.numbers() {
        let expected = format.screenshot_name(number);
        if !images.iter().any(|(_, name)| *name == expected) {
            warnings.push(ConversionWarning::StepWithoutImage {
                step: number,
                expected,
            });
        }
    }
    for (step, filename) in images {
        if !steps.contains(*step) {
            warnings.push(ConversionWarning::ImageWithoutStep {
                filename: filename.clone(),
                step: *step,
            });
        }
    }
    warnings
}

/// Fields of [`ConversionMetadata`] that come from the conversion run.
#[derive(Debug, Clone)]
pub struct MetadataInput<'a> {
    pub original_filename: &'a str,
    pub markdown_filename: &'a str,
    pub image_filenames: Vec<String>,
    pub image_count: usize,
    pub failed_images: usize,
    pub step_count: usize,
    pub warnings: Vec<ConversionWarning>,
    pub converted_on: DateTime<Local>,
}

/// Assemble the metadata record.
pub fn build_metadata(input: MetadataInput<'_>, config: &ConversionConfig) -> ConversionMetadata {
    ConversionMetadata {
        conversion_info: ConversionInfo {
            original_file: input.original_filename.to_string(),
            converted_on: input.converted_on.to_rfc3339(),
            converter_version: CONVERTER_VERSION.to_string(),
            image_format: config.image_format,
            image_quality: config.effective_quality(),
        },
        statistics: MetadataStatistics {
            total_images: input.image_count,
            total_steps: input.step_count,
            failed_images: input.failed_images,
        },
        files: MetadataFiles {
            markdown: input.markdown_filename.to_string(),
            images: input.image_filenames,
        },
        warnings: input.warnings,
    }
}

/// Serialise the metadata as pretty-printed JSON.
pub fn metadata_json(metadata: &ConversionMetadata) -> Result<String, Mht2MdError> {
    serde_json::to_string_pretty(metadata)
        .map_err(|e| Mht2MdError::Internal(format!("metadata serialisation: {e}")))
}
