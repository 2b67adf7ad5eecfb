//! Error types for the mht2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Mht2MdError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing input, unparseable container, no HTML part, write failure).
//!   Returned as `Err(Mht2MdError)` from [`crate::convert()`]. The output
//!   directory is removed before the error reaches the caller.
//!
//! * [`ImageError`] — **Non-fatal**: a single embedded image could not be
//!   decoded or re-encoded, but the rest of the capture is fine. Stored as a
//!   [`crate::output::ConversionWarning`] so callers can still use the
//!   document produced from the remaining steps and screenshots.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mht2md library.
#[derive(Debug, Error)]
pub enum Mht2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("MHT file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input failed for a reason other than permissions.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Container errors ──────────────────────────────────────────────────
    /// The bytes cannot be parsed as a MIME multipart message at all.
    #[error("Malformed MHT container: {detail}")]
    MalformedContainer { detail: String },

    /// The container holds no `text/html` part, so there is no step text.
    #[error("No HTML part found in the MHT file")]
    NoHtmlPart,

    // ── Image errors ──────────────────────────────────────────────────────
    /// An embedded image could not be decoded or re-encoded.
    ///
    /// Returned while [`crate::ConversionConfig::strict_images`] is set (the
    /// default); otherwise the failure is recorded as a warning.
    #[error("Failed to process image '{filename}': {detail}")]
    ImageDecodeFailure { filename: String, detail: String },

    /// Every image failed and no step text was found; the document would be empty.
    #[error("No usable content: no steps found and all {failed_images} images failed")]
    NoUsableContent { failed_images: usize },

    /// Some images were written but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionResult::into_strict`] when
    /// the caller wants to treat any image failure as an error.
    #[error("{failed}/{total} images failed during conversion", total = .written + .failed)]
    PartialFailure { written: usize, failed: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write one of its files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageError {
    /// The payload is not a decodable image of its declared type.
    #[error("{filename}: decode failed: {detail}")]
    DecodeFailed { filename: String, detail: String },

    /// The decoded image could not be re-encoded in the target format.
    #[error("{filename}: encode failed: {detail}")]
    EncodeFailed { filename: String, detail: String },
}

impl ImageError {
    /// Output filename the failed image would have been written to.
    pub fn filename(&self) -> &str {
        match self {
            ImageError::DecodeFailed { filename, .. } | ImageError::EncodeFailed { filename, .. } => {
                filename
            }
        }
    }
}

impl From<ImageError> for Mht2MdError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::DecodeFailed { filename, detail } => {
                Mht2MdError::ImageDecodeFailure { filename, detail }
            }
            ImageError::EncodeFailed { filename, detail } => Mht2MdError::ImageDecodeFailure {
                filename,
                detail: format!("encode: {detail}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = Mht2MdError::PartialFailure {
            written: 9,
            failed: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn input_not_found_display() {
        let e = Mht2MdError::InputNotFound {
            path: PathBuf::from("/tmp/missing.mht"),
        };
        assert!(e.to_string().contains("missing.mht"));
    }

    #[test]
    fn image_error_converts_to_fatal() {
        let e = ImageError::DecodeFailed {
            filename: "screenshot0003.png".into(),
            detail: "bad huffman table".into(),
        };
        assert_eq!(e.filename(), "screenshot0003.png");
        let fatal: Mht2MdError = e.into();
        assert!(matches!(
            fatal,
            Mht2MdError::ImageDecodeFailure { ref filename, .. } if filename == "screenshot0003.png"
        ));
    }

    #[test]
    fn image_error_serialises_with_kind_tag() {
        let e = ImageError::EncodeFailed {
            filename: "screenshot0001.JPEG".into(),
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"kind\":\"encode_failed\""), "got: {json}");
    }
}
