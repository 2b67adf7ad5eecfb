//! Result types returned by a conversion.
//!
//! [`ConversionResult`] is what the caller gets back; [`ConversionMetadata`]
//! is the part of it that is also persisted as `conversion_metadata.json`
//! next to the Markdown file.

use crate::config::ImageFormat;
use crate::error::{ImageError, Mht2MdError};
use crate::pipeline::steps::StepRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filename of the metadata sidecar inside the output directory.
pub const METADATA_FILENAME: &str = "conversion_metadata.json";

/// Version string embedded in the document footer and metadata.
pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything produced by one successful [`crate::convert()`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// `<root>/<base>/`
    pub output_dir: PathBuf,
    /// `<root>/<base>/<base>.md`
    pub markdown_path: PathBuf,
    /// `<root>/<base>/conversion_metadata.json`
    pub metadata_path: PathBuf,
    /// Screenshots written, in container order (overwritten ones included).
    pub images: Vec<ImageAsset>,
    /// Step narration found in the HTML part.
    pub steps: StepRecord,
    pub stats: ConversionStats,
    /// The record written to the metadata sidecar.
    pub metadata: ConversionMetadata,
}

impl ConversionResult {
    /// Non-fatal issues: failed images, collisions, unmatched steps or images.
    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.metadata.warnings
    }

    /// Convert to `Err` if any image failed.
    ///
    /// With `strict_images` off a conversion succeeds when at least some
    /// content survives. Call this to treat any per-image failure as an error.
    pub fn into_strict(self) -> Result<Self, Mht2MdError> {
        if self.stats.failed_images > 0 {
            Err(Mht2MdError::PartialFailure {
                written: self.stats.total_images,
                failed: self.stats.failed_images,
            })
        } else {
            Ok(self)
        }
    }
}

/// Aggregate counts for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Images written to disk (each write counts, even if a later image
    /// with the same step number overwrote it).
    pub total_images: usize,
    /// Steps with non-empty narration.
    pub total_steps: usize,
    /// Images that could not be decoded or re-encoded.
    pub failed_images: usize,
    /// Wall-clock time for the whole conversion.
    #[serde(default)]
    pub duration_ms: u64,
}

/// How an image's step number was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// First digit run of the `Content-Location` header.
    ContentLocation,
    /// 1-indexed position among the container's image parts.
    Sequence,
}

/// One screenshot written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Step number the screenshot is correlated with.
    pub step: u32,
    /// `screenshot%04d.<ext>`
    pub filename: String,
    /// Content-Type of the source part.
    pub source_type: String,
    /// Content-Type of the written file.
    pub output_type: String,
    pub correlation: Correlation,
}

/// A non-fatal issue recorded in the result and the metadata sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionWarning {
    /// An image was skipped because it could not be processed.
    ImageFailed { index: usize, error: ImageError },
    /// Two images mapped to the same file; the later one replaced the earlier.
    ImageCollision {
        filename: String,
        step: u32,
        replaced_index: usize,
        index: usize,
    },
    /// A screenshot whose step number has no narration.
    ImageWithoutStep { filename: String, step: u32 },
    /// A step whose referenced screenshot was never written.
    StepWithoutImage { step: u32, expected: String },
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionWarning::ImageFailed { index, error } => {
                write!(f, "image #{index} skipped: {error}")
            }
            ConversionWarning::ImageCollision {
                filename,
                replaced_index,
                index,
                ..
            } => write!(
                f,
                "image #{index} overwrote image #{replaced_index} as {filename}"
            ),
            ConversionWarning::ImageWithoutStep { filename, step } => {
                write!(f, "{filename} has no text for step {step}")
            }
            ConversionWarning::StepWithoutImage { step, expected } => {
                write!(f, "step {step} references missing {expected}")
            }
        }
    }
}

/// The metadata sidecar, serialised as pretty JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionMetadata {
    pub conversion_info: ConversionInfo,
    pub statistics: MetadataStatistics,
    pub files: MetadataFiles,
    #[serde(default)]
    pub warnings: Vec<ConversionWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionInfo {
    pub original_file: String,
    /// RFC 3339 local timestamp.
    pub converted_on: String,
    pub converter_version: String,
    pub image_format: ImageFormat,
    pub image_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStatistics {
    pub total_images: usize,
    pub total_steps: usize,
    #[serde(default)]
    pub failed_images: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFiles {
    pub markdown: String,
    /// Screenshot files present in the output directory, sorted.
    pub images: Vec<String>,
}

/// Summary returned by [`crate::inspect()`]; nothing is written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub total_parts: usize,
    pub has_html: bool,
    /// Image parts with a non-empty payload.
    pub image_parts: usize,
    pub steps: StepRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(failed: usize) -> ConversionResult {
        ConversionResult {
            output_dir: PathBuf::from("out"),
            markdown_path: PathBuf::from("out/out.md"),
            metadata_path: PathBuf::from("out").join(METADATA_FILENAME),
            images: vec![],
            steps: StepRecord::new(),
            stats: ConversionStats {
                total_images: 3,
                total_steps: 2,
                failed_images: failed,
                duration_ms: 0,
            },
            metadata: ConversionMetadata {
                conversion_info: ConversionInfo {
                    original_file: "out.mht".into(),
                    converted_on: "2024-01-02T03:04:05+00:00".into(),
                    converter_version: CONVERTER_VERSION.into(),
                    image_format: ImageFormat::Png,
                    image_quality: 100,
                },
                statistics: MetadataStatistics {
                    total_images: 3,
                    total_steps: 2,
                    failed_images: failed,
                },
                files: MetadataFiles {
                    markdown: "out.md".into(),
                    images: vec![],
                },
                warnings: vec![],
            },
        }
    }

    #[test]
    fn into_strict_passes_clean_result() {
        assert!(result_with(0).into_strict().is_ok());
    }

    #[test]
    fn into_strict_rejects_partial_failure() {
        let err = result_with(1).into_strict().unwrap_err();
        assert!(matches!(
            err,
            Mht2MdError::PartialFailure {
                written: 3,
                failed: 1
            }
        ));
    }

    #[test]
    fn warning_serialises_with_type_tag() {
        let w = ConversionWarning::StepWithoutImage {
            step: 4,
            expected: "screenshot0004.png".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["type"], "step_without_image");
        assert_eq!(json["step"], 4);
        assert!(w.to_string().contains("screenshot0004.png"));
    }

    #[test]
    fn metadata_schema_field_names() {
        let json = serde_json::to_value(&result_with(0).metadata).unwrap();
        assert_eq!(json["conversion_info"]["image_format"], "PNG");
        assert_eq!(json["conversion_info"]["image_quality"], 100);
        assert_eq!(json["statistics"]["total_images"], 3);
        assert_eq!(json["statistics"]["total_steps"], 2);
        assert_eq!(json["files"]["markdown"], "out.md");
    }
}
