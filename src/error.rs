//! Error types shared across the report engine.
//!
//! Two families exist. [`CaptureError`] describes why a single visual could not
//! be rasterized; it never escapes the capture adapter and ends up as the reason
//! text of a placeholder line. [`ReportError`] is fatal and aborts composition
//! or rendering.

use std::io;

/// Reasons a visual capture attempt can fail.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The referenced visual is not mounted or not displayed.
    #[error("Chart element \"{0}\" is not visible")]
    NotVisible(String),
    /// The raster came back with a zero width or height.
    #[error("Chart \"{name}\" rendered with zero dimensions ({width}x{height})")]
    ZeroDimension {
        /// Name of the visual.
        name: String,
        /// Reported raster width in pixels.
        width: u32,
        /// Reported raster height in pixels.
        height: u32,
    },
    /// The encoded raster is empty, a placeholder, or not an image at all.
    #[error("Chart \"{name}\" generated invalid image data: {detail}")]
    InvalidPayload {
        /// Name of the visual.
        name: String,
        /// What was wrong with the payload.
        detail: String,
    },
    /// Rasterization exceeded its time budget.
    #[error("Chart \"{name}\" timed out after {millis} ms")]
    CaptureTimeout {
        /// Name of the visual.
        name: String,
        /// The budget that elapsed.
        millis: u64,
    },
}

impl CaptureError {
    /// Short machine-friendly identifier of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotVisible(_) => "NotVisible",
            Self::ZeroDimension { .. } => "ZeroDimension",
            Self::InvalidPayload { .. } => "InvalidPayload",
            Self::CaptureTimeout { .. } => "CaptureTimeout",
        }
    }
}

/// Fatal errors raised while building, laying out or serializing a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report context failed validation.
    #[error("Invalid report context: {0}")]
    InvalidContext(String),

    /// Table or text content is structurally malformed.
    #[error("Layout error: {0}")]
    Layout(String),

    /// The configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The PDF backend reported an error.
    #[error("PDF rendering failed: {0}")]
    Render(String),

    /// Reading inputs or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON input could not be parsed.
    #[error("Failed to parse JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// Outline entries could not be attached to the rendered PDF.
    #[cfg(feature = "bookmarks")]
    #[error("Failed to add bookmarks: {0}")]
    Bookmark(#[from] crate::bookmarks::BookmarkError),
}
