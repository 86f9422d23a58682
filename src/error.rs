//! Error types for the `clipgif` crate.
//!
//! This module defines [`ClipError`], the unified error type returned by all
//! fallible operations in the crate. Errors are split into two families by
//! [`ClipError::is_fallback_eligible`]: failures of a frame sampling strategy,
//! which let the orchestrator retry with the next strategy, and terminal
//! failures, which end the conversion.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `clipgif` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClipError {
    /// The media duration is zero, negative, or not finite.
    #[error("Media duration is not usable: {0}")]
    InvalidDuration(f64),

    /// The native video dimensions are not known yet (media not decoded).
    #[error("Video dimensions are unavailable")]
    MissingDimensions,

    /// No drawing context could be created for the capture surface.
    #[error("Failed to create 2D drawing context: {0}")]
    ContextCreationFailure(String),

    /// A seek neither completed nor failed within the timeout.
    #[error("Seek to {time:.3}s timed out after {timeout:?}")]
    SeekTimeout {
        /// Target position in seconds.
        time: f64,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The media source reported an error while seeking.
    #[error("Seek to {time:.3}s failed: {reason}")]
    SeekError {
        /// Target position in seconds.
        time: f64,
        /// Reason reported by the media source.
        reason: String,
    },

    /// Playback could not be started.
    #[error("Playback failed: {0}")]
    PlaybackError(String),

    /// The media source had no displayed frame to capture.
    #[error("No video frame available at {time:.3}s")]
    NoFrameAvailable {
        /// Playback position at capture time.
        time: f64,
    },

    /// Drawing or reading back the capture surface failed.
    #[error("Frame capture failed: {0}")]
    CaptureError(String),

    /// The encoder sink aborted rendering.
    #[error("GIF rendering was aborted")]
    EncoderAbort,

    /// The encoder sink failed (construction or rendering).
    #[error("GIF encoder error: {0}")]
    EncoderError(String),

    /// Another conversion is already running on this context.
    #[error("A conversion is already in progress")]
    ConversionInProgress,

    /// The conversion was cancelled via its [`ConversionFlag`](crate::ConversionFlag).
    #[error("Conversion cancelled")]
    Cancelled,

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the media source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while writing the artifact.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl ClipError {
    /// Whether a strategy that failed with this error may be replaced by the
    /// next strategy in the list.
    ///
    /// Encoder failures, precondition failures, cancellation and the
    /// in-progress guard are terminal; everything raised while driving the
    /// media source is not.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(
            self,
            ClipError::InvalidDuration(_)
                | ClipError::MissingDimensions
                | ClipError::ContextCreationFailure(_)
                | ClipError::EncoderAbort
                | ClipError::EncoderError(_)
                | ClipError::ConversionInProgress
                | ClipError::Cancelled
                | ClipError::IoError(_)
        )
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for ClipError {
    fn from(error: FfmpegError) -> Self {
        ClipError::FfmpegError(error.to_string())
    }
}
