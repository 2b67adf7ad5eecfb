//! Pipeline stages for MHT-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own with in-memory inputs.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ steps ───┐
//! mime ──────┤             ├──▶ markdown ──▶ writer
//! (parts)    └──▶ images ──┘    (md + json)   (output dir)
//! ```
//!
//! 1. [`mime`]     — split the MIME container into decoded leaf parts
//! 2. [`steps`]    — decode the HTML part and collect `Step N:` narration
//! 3. [`images`]   — correlate image parts with steps, normalise, write
//! 4. [`markdown`] — render the document and the metadata sidecar
//! 5. [`writer`]   — own the output directory; atomic writes and cleanup

pub mod images;
pub mod markdown;
pub mod mime;
pub mod steps;
pub mod writer;
