//! # clipgif
//!
//! Turn a time window of a video into an animated GIF.
//!
//! The heart of the crate is a frame-extraction scheduler: given a clip
//! window and a frame rate it works out exactly which instants to sample,
//! drives a [`MediaSource`] through them, captures each frame onto a draw
//! surface and hands the sequence to an [`EncoderSink`]. Two sampling
//! strategies are available:
//!
//! - [`Strategy::Playback`] plays the clip (up to 8x) and captures frames as
//!   playback reaches each scheduled instant. Fast, but only as precise as
//!   the frame cadence.
//! - [`Strategy::Seek`] seeks to every instant and waits for the frame. Slow,
//!   but it yields exactly the planned frames.
//!
//! Playback is tried first and seeking takes over when it fails. The media
//! source's mute and rate are restored whatever happens.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clipgif::{
//!     ConversionContext, ConversionOptions, FfmpegMediaSource, GifSink, SizePreset,
//!     SoftwareSurface,
//! };
//!
//! # async fn example() -> Result<(), clipgif::ClipError> {
//! let mut source = FfmpegMediaSource::open("input.mp4")?;
//! let options = ConversionOptions::new()
//!     .with_fps(12)
//!     .with_size(SizePreset::Small);
//!
//! let mut context = ConversionContext::new(options);
//! context.set_window(Some("00:00:10"), Some("00:00:14"), source.duration())?;
//!
//! let output = context
//!     .convert(&mut source, &mut SoftwareSurface::new(), &mut GifSink::new)
//!     .await?;
//! println!("{} frames, {}", output.frame_count, output.human_size());
//! output.save("clip.gif")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress
//!
//! Attach a [`ProgressCallback`] with
//! [`ConversionOptions::with_progress`]. Extraction covers 5–75 % of the
//! overall scale and encoding 75–100 %.
//!
//! ## Cancellation
//!
//! [`ConversionContext::flag`] returns a cloneable [`ConversionFlag`];
//! lowering it with [`ConversionFlag::cancel`] stops the conversion at its
//! next tick with [`ClipError::Cancelled`].
//!
//! ## Features
//!
//! - `ffmpeg` (default): [`FfmpegMediaSource`], a media source over FFmpeg.
//! - `gif` (default): [`GifSink`], an encoder sink over the `gif` crate with
//!   `rayon` workers.

pub mod canvas;
pub mod configuration;
pub mod conversion;
pub mod error;
#[cfg(feature = "gif")]
pub mod gif;
pub mod guard;
pub mod media;
pub mod plan;
pub mod progress;
pub mod sampler;
pub mod session;
pub mod sink;
#[cfg(feature = "ffmpeg")]
pub mod source;
#[cfg(feature = "ffmpeg")]
mod utilities;
pub mod window;

pub use canvas::{
    ContextOptions, DrawContext, SoftwareContext, SoftwareSurface, SurfaceProvider,
    create_2d_context,
};
pub use configuration::{ConversionOptions, DEFAULT_FPS, DEFAULT_QUALITY};
pub use conversion::{ConversionContext, ConversionOutput, ConversionState};
pub use error::ClipError;
#[cfg(feature = "gif")]
pub use gif::GifSink;
pub use guard::{MediaSnapshot, MediaStateGuard};
pub use media::{MediaSource, SeekOutcome};
pub use plan::{ExtractionPlan, SizePreset};
pub use progress::{ConversionFlag, ConversionPhase, ProgressCallback, ProgressInfo};
pub use sampler::{DEFAULT_SEEK_TIMEOUT, Sampler};
pub use session::{ExtractionSession, FrameSample, Strategy};
pub use sink::{EncoderAdapter, EncoderSink, SinkEvent, SinkFactory, SinkOptions, WorkerMode};
#[cfg(feature = "ffmpeg")]
pub use source::{FfmpegMediaSource, set_ffmpeg_verbose};
pub use window::{ClipWindow, format_time, parse_time};
