//! The media source contract.
//!
//! [`MediaSource`] models a playable video the way a media element exposes
//! it: a current position that can be set (starting a seek), play/pause
//! controls, mute and rate attributes, and readiness signals. The signals are
//! futures rather than event listeners, so timeouts and cancellation compose
//! with ordinary `async` code.
//!
//! The crate ships [`FfmpegMediaSource`](crate::FfmpegMediaSource) behind the
//! `ffmpeg` feature; tests and other hosts provide their own implementation.

use image::DynamicImage;

use crate::error::ClipError;

/// Result of a seek, as signalled by the media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The new position is decoded and displayable.
    Seeked,
    /// The source reported an error while seeking.
    Failed(String),
}

/// A seekable, playable video with readiness signals.
///
/// All methods are driven from a single task; none of the futures need to be
/// `Send`.
#[allow(async_fn_in_trait)]
pub trait MediaSource {
    /// Total media duration in seconds. May be `0.0` or non-finite before
    /// metadata is known.
    fn duration(&self) -> f64;

    /// Native frame size, or `None` until the first frame is decoded.
    fn video_dimensions(&self) -> Option<(u32, u32)>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Start seeking to `seconds`. Completion is signalled through
    /// [`seek_settled`](MediaSource::seek_settled).
    ///
    /// # Errors
    ///
    /// Implementations may refuse the seek synchronously.
    fn set_current_time(&mut self, seconds: f64) -> Result<(), ClipError>;

    /// Resolves once the pending seek has completed or failed.
    async fn seek_settled(&mut self) -> SeekOutcome;

    /// Whether [`next_video_frame`](MediaSource::next_video_frame) is a real
    /// "new frame presented" signal on this source.
    fn supports_video_frame_callback(&self) -> bool;

    /// Resolves once the next video frame has been presented.
    async fn next_video_frame(&mut self);

    /// Resolves on the next rendering cycle of the host.
    async fn next_paint(&mut self);

    /// Start playback at the current position and rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the source refuses to play.
    async fn play(&mut self) -> Result<(), ClipError>;

    /// Pause playback.
    fn pause(&mut self);

    /// Whether playback is paused.
    fn is_paused(&self) -> bool;

    /// Whether playback reached the end of the stream.
    fn has_ended(&self) -> bool;

    /// Whether audio output is muted.
    fn is_muted(&self) -> bool;

    /// Mute or unmute audio output.
    fn set_muted(&mut self, muted: bool);

    /// Current playback rate multiplier.
    fn playback_rate(&self) -> f64;

    /// Set the playback rate multiplier.
    fn set_playback_rate(&mut self, rate: f64);

    /// The frame currently on display, at native resolution.
    fn displayed_frame(&self) -> Option<&DynamicImage>;
}
