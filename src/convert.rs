//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline for one capture and owns its output
//! directory for the duration of the call: the directory is created up front
//! and removed again if any stage fails, so a failed run never leaves partial
//! artifacts behind. [`inspect`] parses a capture without writing anything.

use crate::config::ConversionConfig;
use crate::error::Mht2MdError;
use crate::output::{ContainerSummary, ConversionResult, ConversionStats, METADATA_FILENAME};
use crate::pipeline::images::extract_images;
use crate::pipeline::markdown::{
    build_metadata, correlation_warnings, metadata_json, render_markdown, DocumentInput,
    MetadataInput,
};
use crate::pipeline::mime::parse_container;
use crate::pipeline::steps::{extract_steps, find_html};
use crate::pipeline::writer::OutputDir;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Convert an MHT capture to Markdown plus screenshots.
///
/// Output is written to `<root>/<stem>/`, where `<root>` is
/// [`ConversionConfig::output_root`] or the input's parent directory:
///
/// * `<stem>.md` — the generated document
/// * `conversion_metadata.json` — the metadata sidecar
/// * `screenshot%04d.<ext>` — one file per extracted image
///
/// # Returns
/// `Ok(ConversionResult)` on success. With `strict_images` off, some images
/// may have been skipped (check `result.stats.failed_images` or call
/// [`ConversionResult::into_strict`]).
///
/// # Errors
/// Every error leaves no output directory behind (a pre-existing directory
/// is kept, minus the files this run wrote):
/// - Input not found / unreadable
/// - Not a multipart container, or no HTML part
/// - Corrupt image (unless `strict_images` is off)
/// - No steps and every image failed (`strict_images` off)
/// - Filesystem write failure
pub fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Mht2MdError> {
    let start = Instant::now();
    let input = input.as_ref();
    info!("Processing: {}", input.display());

    // ── Step 1: Validate and read input ──────────────────────────────────
    let bytes = read_input(input)?;
    let (base_name, original_filename) = input_names(input)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input);
    }

    // ── Step 2: Create output directory ──────────────────────────────────
    let root = config
        .output_root
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let mut out = OutputDir::create(root.join(&base_name))?;
    info!("Output directory: {}", out.path().display());

    // ── Step 3: Parse container ──────────────────────────────────────────
    let container = parse_container(&bytes)?;

    // ── Step 4: Step text ────────────────────────────────────────────────
    let html = find_html(&container)?;
    let steps = extract_steps(&html);

    // ── Step 5: Screenshots ──────────────────────────────────────────────
    let images = extract_images(&container, &mut out, config)?;
    if steps.is_empty() && images.count() == 0 && !images.failures.is_empty() {
        return Err(Mht2MdError::NoUsableContent {
            failed_images: images.failures.len(),
        });
    }

    // ── Step 6: Markdown ─────────────────────────────────────────────────
    let now = Local::now();
    let markdown = render_markdown(&DocumentInput {
        base_name: &base_name,
        original_filename: &original_filename,
        steps: &steps,
        image_count: images.count(),
        image_format: config.image_format,
        generated_at: now,
    });
    let markdown_filename = format!("{base_name}.md");
    let markdown_path = out.write(&markdown_filename, markdown.as_bytes())?;

    // ── Step 7: Metadata sidecar ─────────────────────────────────────────
    let pairs: Vec<(u32, String)> = images
        .assets
        .iter()
        .map(|a| (a.step, a.filename.clone()))
        .collect();
    let mut warnings = images.failures.clone();
    warnings.extend(images.collisions.iter().cloned());
    warnings.extend(correlation_warnings(&steps, &pairs, config.image_format));
    for w in &warnings {
        debug!("Warning: {}", w);
    }

    let metadata = build_metadata(
        MetadataInput {
            original_filename: &original_filename,
            markdown_filename: &markdown_filename,
            image_filenames: images.filenames(),
            image_count: images.count(),
            failed_images: images.failures.len(),
            step_count: steps.len(),
            warnings,
            converted_on: now,
        },
        config,
    );
    let metadata_path = out.write(METADATA_FILENAME, metadata_json(&metadata)?.as_bytes())?;

    // ── Step 8: Hand off ─────────────────────────────────────────────────
    let output_dir = out.commit();
    let stats = ConversionStats {
        total_images: images.count(),
        total_steps: steps.len(),
        failed_images: images.failures.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} images, {} steps, {} warnings, {}ms",
        stats.total_images,
        stats.total_steps,
        metadata.warnings.len(),
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.total_images, stats.total_steps);
    }

    Ok(ConversionResult {
        output_dir,
        markdown_path,
        metadata_path,
        images: images.assets,
        steps,
        stats,
        metadata,
    })
}

/// Parse an MHT capture and report what a conversion would find.
///
/// Writes nothing. A container without an HTML part is reported with
/// `has_html = false` rather than as an error.
pub fn inspect(input: impl AsRef<Path>) -> Result<ContainerSummary, Mht2MdError> {
    let input = input.as_ref();
    let bytes = read_input(input)?;
    let container = parse_container(&bytes)?;
    let steps = match find_html(&container) {
        Ok(html) => Some(extract_steps(&html)),
        Err(Mht2MdError::NoHtmlPart) => None,
        Err(e) => return Err(e),
    };
    Ok(ContainerSummary {
        total_parts: container.len(),
        has_html: steps.is_some(),
        image_parts: container.images().count(),
        steps: steps.unwrap_or_default(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn read_input(path: &Path) -> Result<Vec<u8>, Mht2MdError> {
    if !path.exists() {
        return Err(Mht2MdError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Mht2MdError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => Mht2MdError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => Mht2MdError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// `(stem, filename)` of the input path.
fn input_names(path: &Path) -> Result<(String, String), Mht2MdError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Mht2MdError::InputNotFound {
            path: path.to_path_buf(),
        })?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| stem.clone());
    Ok((stem, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_names_strip_extension() {
        let (stem, name) = input_names(Path::new("/tmp/My Capture.mht")).unwrap();
        assert_eq!(stem, "My Capture");
        assert_eq!(name, "My Capture.mht");

        let (stem, _) = input_names(Path::new("archive.tar.mht")).unwrap();
        assert_eq!(stem, "archive.tar");
    }

    #[test]
    fn missing_input_creates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("absent.mht");
        let err = convert(&input, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, Mht2MdError::InputNotFound { .. }));
        assert!(!root.path().join("absent").exists());
    }

    #[test]
    fn malformed_container_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("junk.mht");
        std::fs::write(&input, b"this is not MIME").unwrap();
        let err = convert(&input, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, Mht2MdError::MalformedContainer { .. }));
        assert!(!root.path().join("junk").exists());
    }

    #[test]
    fn inspect_reports_missing_html() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("img.mht");
        std::fs::write(
            &input,
            "Content-Type: multipart/related; boundary=b\n\n--b\nContent-Type: image/gif\n\nGIF89a\n--b--\n",
        )
        .unwrap();
        let summary = inspect(&input).unwrap();
        assert!(!summary.has_html);
        assert_eq!(summary.total_parts, 1);
        assert_eq!(summary.image_parts, 1);
        assert!(summary.steps.is_empty());
    }
}
