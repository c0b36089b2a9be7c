// SPDX-License-Identifier: LGPL-3.0-only
//! Error types for the icon cache.

use tracker_core::CoreError;

use crate::icon::mode::IconDrawMode;

/// Errors that can occur in the icon cache.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    /// A collaborator has no icon for the request.
    #[error("Icon '{0}' not found")]
    NotFound(String),

    /// A bitmap buffer could not be allocated.
    #[error("Failed to allocate a {width}x{height} bitmap")]
    AllocationFailed {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Internal contract broken; fatal in debug builds.
    #[error("Icon cache invariant violated: {0}")]
    InvariantViolation(String),

    /// The draw mode is a reserved flag combination the cache does not build bitmaps for.
    #[error("Draw mode {0:?} is not materialized by the icon cache")]
    UnsupportedMode(IconDrawMode),

    /// Source and destination bitmaps disagree on size or color space.
    #[error("Bitmap format mismatch: {0}")]
    FormatMismatch(String),

    /// Arena or hash index failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Invalid image format: {0}")]
    Image(#[from] image::ImageError),
}

/// Report a broken internal contract.
///
/// Panics in debug builds; logs and returns the error in release builds.
pub(crate) fn invariant_violation(message: impl Into<String>) -> IconError {
    let message = message.into();
    if cfg!(debug_assertions) {
        panic!("icon cache invariant violated: {message}");
    }
    log::error!("Icon cache invariant violated: {}", message);
    IconError::InvariantViolation(message)
}
