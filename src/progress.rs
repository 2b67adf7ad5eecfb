//! Progress-callback trait for per-image conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the engine writes each screenshot. Callers can forward them to a
//! terminal progress bar, a log, or a status page without the library
//! knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use mht2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_image_saved(&self, filename: &str, index: usize) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("#{index}: {filename}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { saved: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion engine as it processes a capture.
///
/// The engine itself is single-threaded, but the trait is `Send + Sync` so a
/// shared config can be used from several threads, each running its own
/// conversion. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the input path has been validated.
    fn on_conversion_start(&self, input: &Path) {
        let _ = input;
    }

    /// Called after a screenshot has been written.
    ///
    /// # Arguments
    /// * `filename` — output filename, e.g. `screenshot0003.png`
    /// * `index`    — 1-indexed position among selected image parts
    fn on_image_saved(&self, filename: &str, index: usize) {
        let _ = (filename, index);
    }

    /// Called when an image could not be decoded or re-encoded.
    fn on_image_error(&self, index: usize, error: &str) {
        let _ = (index, error);
    }

    /// Called once after both artifacts have been written.
    fn on_conversion_complete(&self, images: usize, steps: usize) {
        let _ = (images, steps);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        saved: AtomicUsize,
        errors: AtomicUsize,
        completed_images: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_image_saved(&self, _filename: &str, _index: usize) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _index: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, images: usize, _steps: usize) {
            self.completed_images.store(images, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(Path::new("capture.mht"));
        cb.on_image_saved("screenshot0001.png", 1);
        cb.on_image_error(2, "corrupt");
        cb.on_conversion_complete(1, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_image_saved("screenshot0001.png", 1);
        tracker.on_image_saved("screenshot0002.png", 2);
        tracker.on_image_error(3, "truncated JPEG");
        tracker.on_conversion_complete(2, 2);

        assert_eq!(tracker.saved.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_images.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(Path::new("a.mht"));
        cb.on_image_saved("screenshot0001.JPEG", 1);
    }
}
