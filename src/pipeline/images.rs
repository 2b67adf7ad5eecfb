//! Screenshot extraction: image parts → `screenshot%04d.<ext>` files.
//!
//! ## Step correlation
//!
//! Each image is named after the step it belongs to. The recorder embeds the
//! step number in the part's `Content-Location` (e.g. `screenshot0005.JPEG`),
//! so the first run of digits there wins; parts without one fall back to
//! their 1-indexed position among the container's image parts. Two parts can
//! still map to the same number: the later file replaces the earlier one and
//! the collision is reported as a [`ConversionWarning::ImageCollision`].
//!
//! ## Normalisation
//!
//! Only JPEG sources are re-encoded: to opaque RGB PNG under
//! [`ImageFormat::Png`], or to JPEG at the configured quality under
//! [`ImageFormat::Jpeg`]. Every other image type is copied byte-for-byte.
//!
//! ## Failures
//!
//! A payload that cannot be transfer-decoded, decoded or re-encoded stops the
//! conversion with [`Mht2MdError::ImageDecodeFailure`]. With
//! `strict_images` off it is recorded as [`ConversionWarning::ImageFailed`]
//! instead and the remaining images are still written.

use crate::config::{ConversionConfig, ImageFormat};
use crate::error::{ImageError, Mht2MdError};
use crate::output::{ConversionWarning, Correlation, ImageAsset};
use crate::pipeline::mime::Container;
use crate::pipeline::writer::OutputDir;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageFormat as Codec, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// Outcome of [`extract_images`].
#[derive(Debug, Default)]
pub struct ImageExtraction {
    /// Written screenshots, in container order.
    pub assets: Vec<ImageAsset>,
    /// Images that failed and were skipped.
    pub failures: Vec<ConversionWarning>,
    /// Images that replaced an earlier image with the same filename.
    pub collisions: Vec<ConversionWarning>,
}

impl ImageExtraction {
    /// Number of images written (overwritten ones included).
    pub fn count(&self) -> usize {
        self.assets.len()
    }

    /// Distinct filenames present in the output directory, sorted.
    pub fn filenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assets.iter().map(|a| a.filename.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Extract, normalise and write every non-empty image part.
///
/// # Errors
/// * [`Mht2MdError::OutputWriteFailed`] if a file cannot be written.
/// * [`Mht2MdError::ImageDecodeFailure`] for a corrupt image while
///   `config.strict_images` is set (the default).
pub fn extract_images(
    container: &Container,
    out: &mut OutputDir,
    config: &ConversionConfig,
) -> Result<ImageExtraction, Mht2MdError> {
    info!("Extracting images...");
    let mut result = ImageExtraction::default();
    let mut written_by: HashMap<String, usize> = HashMap::new();

    for (i, part) in container.images().enumerate() {
        let index = i + 1;
        let (step, correlation) = step_number(part.content_location(), index as u32);
        let filename = config.image_format.screenshot_name(step);

        let normalised = match part.decode_error() {
            Some(detail) => Err(ImageError::DecodeFailed {
                filename: filename.clone(),
                detail: detail.to_string(),
            }),
            None => normalise(
                part.payload(),
                part.content_type(),
                config.image_format,
                config.quality,
                &filename,
            ),
        };
        let (bytes, output_type) = match normalised {
            Ok(ok) => ok,
            Err(e) if config.strict_images => return Err(e.into()),
            Err(e) => {
                warn!("Skipping image #{}: {}", index, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_error(index, &e.to_string());
                }
                result
                    .failures
                    .push(ConversionWarning::ImageFailed { index, error: e });
                continue;
            }
        };

        out.write(&filename, &bytes)?;

        if let Some(replaced_index) = written_by.insert(filename.clone(), index) {
            warn!(
                "Image #{} overwrote image #{} ({})",
                index, replaced_index, filename
            );
            result.collisions.push(ConversionWarning::ImageCollision {
                filename: filename.clone(),
                step,
                replaced_index,
                index,
            });
        }

        debug!("Saved: {} ({} bytes, {:?})", filename, bytes.len(), correlation);
        if let Some(ref cb) = config.progress_callback {
            cb.on_image_saved(&filename, index);
        }
        result.assets.push(ImageAsset {
            step,
            filename,
            source_type: part.content_type().to_string(),
            output_type,
            correlation,
        });
    }

    info!(
        "Extracted {} images ({} failed)",
        result.count(),
        result.failures.len()
    );
    Ok(result)
}

/// Step number from the first digit run in `location`, else `fallback`.
///
/// Digit runs too long for `u32` count as no digits.
pub fn step_number(location: Option<&str>, fallback: u32) -> (u32, Correlation) {
    location
        .and_then(|loc| RE_DIGITS.find(loc))
        .and_then(|m| m.as_str().parse().ok())
        .map(|n| (n, Correlation::ContentLocation))
        .unwrap_or((fallback, Correlation::Sequence))
}

fn is_jpeg(content_type: &str) -> bool {
    matches!(content_type, "image/jpeg" | "image/jpg" | "image/pjpeg")
}

/// Apply the format policy to one payload.
///
/// Returns the bytes to write and their content-type.
pub fn normalise(
    payload: &[u8],
    content_type: &str,
    format: ImageFormat,
    quality: u8,
    filename: &str,
) -> Result<(Vec<u8>, String), ImageError> {
    if !is_jpeg(content_type) {
        return Ok((payload.to_vec(), content_type.to_string()));
    }

    let decoded = image::load_from_memory_with_format(payload, Codec::Jpeg).map_err(|e| {
        ImageError::DecodeFailed {
            filename: filename.to_string(),
            detail: e.to_string(),
        }
    })?;
    // Screenshots are opaque; alpha and palette modes are flattened to RGB.
    let rgb: RgbImage = decoded.to_rgb8();

    let mut buf = Vec::new();
    let encoded = match format {
        ImageFormat::Png => rgb.write_with_encoder(PngEncoder::new_with_quality(
            &mut buf,
            CompressionType::Best,
            FilterType::Adaptive,
        )),
        ImageFormat::Jpeg => {
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))
        }
    };
    encoded.map_err(|e| ImageError::EncodeFailed {
        filename: filename.to_string(),
        detail: e.to_string(),
    })?;

    Ok((buf, format.mime_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};
    use std::io::Cursor;

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, (x * y % 256) as u8])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), Codec::Jpeg).unwrap();
        buf
    }

    #[test]
    fn step_number_from_content_location() {
        assert_eq!(
            step_number(Some("step5.jpg"), 9),
            (5, Correlation::ContentLocation)
        );
        assert_eq!(
            step_number(Some("screenshot0012.JPEG"), 9),
            (12, Correlation::ContentLocation)
        );
        assert_eq!(
            step_number(Some("img_3_of_7.png"), 9),
            (3, Correlation::ContentLocation)
        );
    }

    #[test]
    fn step_number_falls_back_to_sequence() {
        assert_eq!(step_number(None, 4), (4, Correlation::Sequence));
        assert_eq!(step_number(Some("cover.png"), 2), (2, Correlation::Sequence));
        assert_eq!(
            step_number(Some("x99999999999999.png"), 1),
            (1, Correlation::Sequence)
        );
    }

    #[test]
    fn jpeg_to_png_keeps_dimensions() {
        let (bytes, ty) = normalise(
            &jpeg_bytes(17, 9),
            "image/jpeg",
            ImageFormat::Png,
            95,
            "screenshot0001.png",
        )
        .unwrap();
        assert_eq!(ty, "image/png");
        let back = image::load_from_memory_with_format(&bytes, Codec::Png).unwrap();
        assert_eq!((back.width(), back.height()), (17, 9));
        assert!(back.color().has_color() && !back.color().has_alpha());
    }

    #[test]
    fn jpeg_reencoded_at_quality() {
        let src = jpeg_bytes(32, 32);
        let (low, ty) =
            normalise(&src, "image/jpg", ImageFormat::Jpeg, 5, "screenshot0001.JPEG").unwrap();
        let (high, _) =
            normalise(&src, "image/jpg", ImageFormat::Jpeg, 100, "screenshot0001.JPEG").unwrap();
        assert_eq!(ty, "image/jpeg");
        assert!(low.len() < high.len());
        assert!(image::load_from_memory_with_format(&low, Codec::Jpeg).is_ok());
    }

    #[test]
    fn other_types_pass_through() {
        let gif = b"GIF89a not really".to_vec();
        let (bytes, ty) =
            normalise(&gif, "image/gif", ImageFormat::Png, 95, "screenshot0001.png").unwrap();
        assert_eq!(bytes, gif);
        assert_eq!(ty, "image/gif");
    }

    #[test]
    fn corrupt_jpeg_is_decode_failure() {
        let err = normalise(
            b"\xFF\xD8 truncated",
            "image/jpeg",
            ImageFormat::Png,
            95,
            "screenshot0003.png",
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::DecodeFailed { .. }));
        assert_eq!(err.filename(), "screenshot0003.png");
    }

    #[test]
    fn filenames_are_sorted_and_deduplicated() {
        let asset = |step: u32| ImageAsset {
            step,
            filename: ImageFormat::Png.screenshot_name(step),
            source_type: "image/jpeg".into(),
            output_type: "image/png".into(),
            correlation: Correlation::Sequence,
        };
        let extraction = ImageExtraction {
            assets: vec![asset(2), asset(1), asset(2)],
            ..Default::default()
        };
        assert_eq!(extraction.count(), 3);
        assert_eq!(
            extraction.filenames(),
            vec!["screenshot0001.png", "screenshot0002.png"]
        );
    }
}
