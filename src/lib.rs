//! # mht2md
//!
//! Convert step-recorder MHT captures into Markdown documents with the
//! screenshots extracted next to them.
//!
//! ## Why this crate?
//!
//! A step recorder saves a session as a single `.mht` web archive: one HTML
//! page with `Step N: ...` narration plus a base64 JPEG per step. Browsers
//! render it, but nothing else does, and it is impossible to diff or edit.
//! This crate unpacks the archive into a plain directory: a Markdown document
//! with one section per step, numbered `screenshot%04d` image files, and a
//! JSON metadata sidecar.
//!
//! ## Pipeline Overview
//!
//! ```text
//! MHT
//!  │
//!  ├─ 1. MIME     split multipart/related into decoded parts
//!  ├─ 2. Steps    decode the HTML part, collect "Step N: ..." narration
//!  ├─ 3. Images   correlate parts with steps, normalise JPEG → PNG/JPEG
//!  ├─ 4. Markdown title, table of contents, one section per step
//!  └─ 5. Output   <base>/<base>.md + screenshots + conversion_metadata.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mht2md::{convert, ConversionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().convert_to_png(true).build()?;
//!     let result = convert("capture.mht", &config)?;
//!     println!("{}", result.markdown_path.display());
//!     eprintln!("{} steps, {} images, {} warnings",
//!         result.stats.total_steps,
//!         result.stats.total_images,
//!         result.warnings().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mht2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! mht2md = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageFormat};
pub use convert::{convert, inspect};
pub use error::{ImageError, Mht2MdError};
pub use output::{
    ContainerSummary, ConversionMetadata, ConversionResult, ConversionStats, ConversionWarning,
    Correlation, ImageAsset,
};
pub use pipeline::steps::StepRecord;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
