//! Configuration types for MHT-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is passed explicitly into
//! every [`crate::convert()`] call; nothing is read from process-wide state, so
//! two conversions running side by side can never observe each other's
//! format policy.

use crate::error::Mht2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default JPEG re-encode quality.
pub const DEFAULT_QUALITY: u8 = 95;

/// Configuration for an MHT-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use mht2md::{ConversionConfig, ImageFormat};
///
/// let config = ConversionConfig::builder()
///     .convert_to_png(true)
///     .quality(85)
///     .build()
///     .unwrap();
/// assert_eq!(config.image_format, ImageFormat::Png);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Output format for JPEG screenshots. Default: [`ImageFormat::Jpeg`].
    ///
    /// Non-JPEG images are always written through byte-for-byte.
    pub image_format: ImageFormat,

    /// JPEG re-encode quality, 1–100. Default: 95.
    ///
    /// Ignored under [`ImageFormat::Png`].
    pub quality: u8,

    /// Directory in which the `<base>/` output folder is created.
    /// If None, the input file's parent directory is used.
    pub output_root: Option<PathBuf>,

    /// Treat the first undecodable image as fatal. Default: true.
    ///
    /// When false, a corrupt image is recorded as a warning and the
    /// conversion continues with the remaining steps and screenshots.
    pub strict_images: bool,

    /// Optional per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::default(),
            quality: DEFAULT_QUALITY,
            output_root: None,
            strict_images: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("image_format", &self.image_format)
            .field("quality", &self.quality)
            .field("output_root", &self.output_root)
            .field("strict_images", &self.strict_images)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Quality recorded in the metadata sidecar: the JPEG quality, or 100
    /// for lossless PNG output.
    pub fn effective_quality(&self) -> u8 {
        match self.image_format {
            ImageFormat::Png => 100,
            ImageFormat::Jpeg => self.quality,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    /// Shorthand for `image_format(ImageFormat::Png)` / `ImageFormat::Jpeg`.
    pub fn convert_to_png(mut self, v: bool) -> Self {
        self.config.image_format = if v {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        };
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.clamp(1, 100);
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = Some(dir.into());
        self
    }

    /// `false` skips corrupt images with a warning instead of failing.
    pub fn strict_images(mut self, v: bool) -> Self {
        self.config.strict_images = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Mht2MdError> {
        let c = &self.config;
        if !(1..=100).contains(&c.quality) {
            return Err(Mht2MdError::InvalidConfig(format!(
                "Quality must be 1–100, got {}",
                c.quality
            )));
        }
        if let Some(ref root) = c.output_root {
            if root.as_os_str().is_empty() {
                return Err(Mht2MdError::InvalidConfig(
                    "Output root must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target format for JPEG screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    /// Re-encode JPEG screenshots as JPEG at the configured quality. (default)
    #[default]
    Jpeg,
    /// Decode JPEG screenshots and re-encode them as opaque RGB PNG.
    Png,
}

impl ImageFormat {
    /// File extension including the dot. The case is a fixed naming
    /// convention (`.png` / `.JPEG`), not derived from the source.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Jpeg => ".JPEG",
        }
    }

    /// Label used in the Markdown header and metadata sidecar.
    pub fn label(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
        }
    }

    /// MIME type of a re-encoded screenshot.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Output filename for a screenshot correlated with `step`.
    pub fn screenshot_name(&self, step: u32) -> String {
        format!("screenshot{:04}{}", step, self.extension())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.image_format, ImageFormat::Jpeg);
        assert_eq!(c.quality, 95);
        assert!(c.strict_images);
        assert!(c.output_root.is_none());
    }

    #[test]
    fn quality_is_clamped() {
        let c = ConversionConfig::builder().quality(0).build().unwrap();
        assert_eq!(c.quality, 1);
        let c = ConversionConfig::builder().quality(250).build().unwrap();
        assert_eq!(c.quality, 100);
    }

    #[test]
    fn effective_quality_is_lossless_for_png() {
        let c = ConversionConfig::builder()
            .convert_to_png(true)
            .quality(40)
            .build()
            .unwrap();
        assert_eq!(c.effective_quality(), 100);
        let c = ConversionConfig::builder().quality(40).build().unwrap();
        assert_eq!(c.effective_quality(), 40);
    }

    #[test]
    fn empty_output_root_rejected() {
        let err = ConversionConfig::builder().output_root("").build();
        assert!(matches!(err, Err(Mht2MdError::InvalidConfig(_))));
    }

    #[test]
    fn screenshot_names_are_zero_padded() {
        assert_eq!(ImageFormat::Png.screenshot_name(5), "screenshot0005.png");
        assert_eq!(ImageFormat::Jpeg.screenshot_name(42), "screenshot0042.JPEG");
        assert_eq!(ImageFormat::Png.screenshot_name(12345), "screenshot12345.png");
    }

    #[test]
    fn debug_hides_callback() {
        let c = ConversionConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let s = format!("{c:?}");
        assert!(s.contains("<dyn ConversionProgressCallback>"));
    }
}
