//! Errors surfaced by the `lumen` binary.

use std::path::PathBuf;

use lumen_core::cvars::CVarError;
use lumen_graphics::{GraphicsError, TextureFormat};

/// Everything that can stop a run before its last frame.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Device, pipeline or asset setup failed.
    #[error("graphics: {0}")]
    Graphics(#[from] GraphicsError),

    /// A console variable could not be registered, parsed or set.
    #[error("console variables: {0}")]
    CVar(#[from] CVarError),

    /// `--set` was not of the form `name=value`.
    #[error("invalid assignment '{0}', expected NAME=VALUE")]
    Assignment(String),

    /// A file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The screenshot has a pixel format PNG export does not handle.
    #[error("screenshot format {0:?} cannot be written as PNG")]
    UnsupportedFormat(TextureFormat),

    /// Pixel data did not match the reported size.
    #[error("screenshot of {width}x{height} has {len} bytes")]
    MalformedScreenshot {
        /// Reported width.
        width: u32,
        /// Reported height.
        height: u32,
        /// Bytes received.
        len: usize,
    },

    /// The PNG could not be written.
    #[error("writing {path}: {source}")]
    Image {
        /// Destination.
        path: PathBuf,
        /// Underlying error.
        source: image::ImageError,
    },

    /// The requested frame finished without delivering a screenshot.
    #[error("frame {0} did not deliver a screenshot")]
    ScreenshotMissing(u64),
}
