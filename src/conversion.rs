//! The extraction session orchestrator.
//!
//! [`ConversionContext`] owns everything one conversion needs to share
//! between steps: the options, the clip window, the conversion flag, and the
//! state machine
//!
//! ```text
//! Idle → Initializing → Extracting(Playback) → Encoding → Finished
//!                            │ strategy failure
//!                            ▼
//!                       Extracting(Seek) → Encoding
//!
//! (any state) ── fatal error / cancellation ──▶ Failed
//! ```
//!
//! Strategies are tried in order from an explicit list. Each attempt gets a
//! fresh session and a fresh sink, and reports back a tagged outcome; frames
//! from a failed attempt are dropped with its sink and never rendered.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::canvas::{DrawContext, SurfaceProvider, create_2d_context};
use crate::configuration::ConversionOptions;
use crate::error::ClipError;
use crate::guard::MediaStateGuard;
use crate::media::MediaSource;
use crate::plan::{ExtractionPlan, plan};
use crate::progress::{ConversionFlag, ProgressReporter};
use crate::sampler::Sampler;
use crate::session::{ExtractionSession, Strategy};
use crate::sink::{EncoderAdapter, EncoderSink, SinkFactory, SinkOptions};
use crate::window::{self, ClipWindow};

/// Where a [`ConversionContext`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionState {
    /// No conversion has run yet.
    #[default]
    Idle,
    /// Validating input and preparing the surface and source.
    Initializing,
    /// Sampling frames with the given strategy.
    Extracting(Strategy),
    /// Rendering the frames into the artifact.
    Encoding,
    /// The last conversion produced an artifact.
    Finished,
    /// The last conversion failed or was cancelled.
    Failed,
}

/// The artifact produced by a successful conversion.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ConversionOutput {
    /// Encoded GIF bytes.
    pub bytes: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Number of frames rendered.
    pub frame_count: u64,
    /// Strategy whose frames were rendered.
    pub strategy: Strategy,
}

impl ConversionOutput {
    /// Size of the artifact in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size as `"12.3 KB"` or `"1.50 MB"`.
    pub fn human_size(&self) -> String {
        let kilobytes = self.bytes.len() as f64 / 1024.0;
        if kilobytes >= 1024.0 {
            format!("{:.2} MB", kilobytes / 1024.0)
        } else {
            format!("{kilobytes:.1} KB")
        }
    }

    /// Write the artifact to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::IoError`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ClipError> {
        log::debug!(
            "Writing {} bytes to {}",
            self.bytes.len(),
            path.as_ref().display()
        );
        fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Conversion state threaded through every step of a conversion.
///
/// # Example
///
/// ```no_run
/// use clipgif::{
///     ConversionContext, ConversionOptions, FfmpegMediaSource, GifSink, SoftwareSurface,
/// };
///
/// # async fn example() -> Result<(), clipgif::ClipError> {
/// let mut source = FfmpegMediaSource::open("input.mp4")?;
/// let mut context = ConversionContext::new(ConversionOptions::new().with_fps(10));
/// context.set_window(Some("00:00:02"), Some("00:00:07"), source.duration())?;
///
/// let output = context
///     .convert(&mut source, &mut SoftwareSurface::new(), &mut GifSink::new)
///     .await?;
/// output.save("clip.gif")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConversionContext {
    options: ConversionOptions,
    flag: ConversionFlag,
    state: ConversionState,
    window: Option<ClipWindow>,
}

impl ConversionContext {
    /// Create an idle context.
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            flag: ConversionFlag::new(),
            state: ConversionState::Idle,
            window: None,
        }
    }

    /// The options conversions run with.
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Replace the options for subsequent conversions.
    pub fn set_options(&mut self, options: ConversionOptions) {
        self.options = options;
    }

    /// A handle on the conversion flag, e.g. for cancelling from elsewhere.
    pub fn flag(&self) -> ConversionFlag {
        self.flag.clone()
    }

    /// Cancel the running conversion at its next tick.
    pub fn cancel(&self) {
        self.flag.cancel();
    }

    /// Whether a conversion is running.
    pub fn is_converting(&self) -> bool {
        self.flag.is_converting()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConversionState {
        self.state
    }

    /// The selected clip window, if any.
    pub fn window(&self) -> Option<ClipWindow> {
        self.window
    }

    /// Select the default window for freshly loaded media.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidDuration`] for unusable durations.
    pub fn load_metadata(&mut self, duration: f64) -> Result<ClipWindow, ClipError> {
        self.window = None;
        let clip = ClipWindow::default_for(duration)?;
        self.window = Some(clip);
        Ok(clip)
    }

    /// Select a window from raw `HH:MM:SS` input.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidDuration`] for unusable durations.
    pub fn set_window(
        &mut self,
        raw_start: Option<&str>,
        raw_end: Option<&str>,
        duration: f64,
    ) -> Result<ClipWindow, ClipError> {
        let clip = window::resolve(raw_start, raw_end, duration)?;
        self.window = Some(clip);
        Ok(clip)
    }

    /// Select a window from bounds in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidDuration`] for unusable durations.
    pub fn set_window_seconds(
        &mut self,
        start: Option<f64>,
        end: Option<f64>,
        duration: f64,
    ) -> Result<ClipWindow, ClipError> {
        let clip = window::resolve_seconds(start, end, duration)?;
        self.window = Some(clip);
        Ok(clip)
    }

    /// Go back to the default window.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidDuration`] for unusable durations.
    pub fn reset_window(&mut self, duration: f64) -> Result<ClipWindow, ClipError> {
        self.load_metadata(duration)
    }

    /// Convert the selected window of `source` into a GIF.
    ///
    /// Sinks are built by `sinks`, one per strategy attempt. The media
    /// source's mute and rate are restored on every exit path; playback is
    /// resumed after a success if it was running before.
    ///
    /// Seek timeouts use `tokio::time`, so this must run inside a Tokio
    /// runtime with the time driver enabled.
    ///
    /// # Errors
    ///
    /// - [`ClipError::InvalidDuration`] if the media has no usable duration.
    /// - [`ClipError::ConversionInProgress`] if the flag is already raised.
    /// - [`ClipError::MissingDimensions`] if the video size is unknown.
    /// - [`ClipError::ContextCreationFailure`] if no capture surface exists.
    /// - the error of the last strategy tried, if every strategy fails.
    /// - [`ClipError::EncoderAbort`] / [`ClipError::EncoderError`] from the sink.
    /// - [`ClipError::Cancelled`] if the flag was lowered meanwhile.
    pub async fn convert<S, P, F>(
        &mut self,
        source: &mut S,
        surface: &mut P,
        sinks: &mut F,
    ) -> Result<ConversionOutput, ClipError>
    where
        S: MediaSource,
        P: SurfaceProvider,
        F: SinkFactory,
    {
        let duration = source.duration();
        if !duration.is_finite() || duration <= 0.0 {
            log::warn!("Refusing to convert media with duration {duration}");
            return Err(ClipError::InvalidDuration(duration));
        }
        let _running = self
            .flag
            .try_begin()
            .ok_or(ClipError::ConversionInProgress)?;

        let reporter = ProgressReporter::new(self.options.progress.clone());
        let result = self.run(source, surface, sinks, &reporter).await;

        match &result {
            Ok(output) => {
                self.state = ConversionState::Finished;
                log::info!(
                    "Converted {} frames ({}x{}, {}) with the {} strategy",
                    output.frame_count,
                    output.width,
                    output.height,
                    output.human_size(),
                    output.strategy,
                );
                reporter.finished();
            }
            Err(error) => {
                self.state = ConversionState::Failed;
                log::error!("Conversion failed: {error}");
                reporter.failed(format!("Conversion failed: {error}"));
            }
        }
        result
    }

    async fn run<S, P, F>(
        &mut self,
        source: &mut S,
        surface: &mut P,
        sinks: &mut F,
        reporter: &ProgressReporter,
    ) -> Result<ConversionOutput, ClipError>
    where
        S: MediaSource,
        P: SurfaceProvider,
        F: SinkFactory,
    {
        self.state = ConversionState::Initializing;
        reporter.initializing(2.0, "Initializing conversion...");

        let duration = source.duration();
        let clip = match self.window {
            Some(clip) => window::resolve_seconds(Some(clip.start()), Some(clip.end()), duration)?,
            None => ClipWindow::default_for(duration)?,
        };
        self.window = Some(clip);

        let options = &self.options;
        let plan = plan(
            clip,
            options.fps,
            options.size,
            source.video_dimensions(),
            options.quality,
            options.looping,
            options.speed,
        )
        .ok_or(ClipError::MissingDimensions)?;
        let workers = options.workers.resolve();
        let strategies = options.strategies.clone();
        let mut context = create_2d_context(surface, plan.target_width, plan.target_height)?;

        log::info!(
            "Converting [{:.3}s, {:.3}s] at {} fps into {}x{} ({} frames, {} workers)",
            clip.start(),
            clip.end(),
            plan.fps,
            plan.target_width,
            plan.target_height,
            plan.frame_count,
            workers,
        );

        let mut guard = MediaStateGuard::acquire(source, plan.speed_multiplier);
        let attempt = Attempt {
            plan: &plan,
            flag: &self.flag,
            reporter,
            seek_timeout: options.seek_timeout,
            workers,
        };

        let mut extracted = None;
        for (position, &strategy) in strategies.iter().enumerate() {
            self.state = ConversionState::Extracting(strategy);
            match attempt.run(strategy, &mut *guard, &mut context, sinks).await {
                AttemptOutcome::Extracted(adapter) => {
                    extracted = Some((strategy, adapter));
                    break;
                }
                AttemptOutcome::Failed(error) => match strategies.get(position + 1) {
                    Some(next) if error.is_fallback_eligible() => {
                        log::warn!("{strategy} extraction failed, falling back to {next}: {error}");
                    }
                    _ => return Err(error),
                },
            }
        }
        let (strategy, adapter) = extracted.ok_or(ClipError::NoFrameAvailable {
            time: clip.start(),
        })?;

        self.state = ConversionState::Encoding;
        let frame_count = adapter.frame_count();
        let bytes = adapter.render_reporting(reporter).await?;
        if !self.flag.is_converting() {
            log::info!("Discarding rendered GIF of a cancelled conversion");
            return Err(ClipError::Cancelled);
        }

        guard.release(true).await;
        Ok(ConversionOutput {
            bytes,
            width: plan.target_width,
            height: plan.target_height,
            frame_count,
            strategy,
        })
    }
}

/// Tagged result of one strategy attempt.
enum AttemptOutcome<K: EncoderSink> {
    Extracted(EncoderAdapter<K>),
    Failed(ClipError),
}

/// What every attempt of one conversion shares.
struct Attempt<'a> {
    plan: &'a ExtractionPlan,
    flag: &'a ConversionFlag,
    reporter: &'a ProgressReporter,
    seek_timeout: Duration,
    workers: usize,
}

impl Attempt<'_> {
    async fn run<S, C, F>(
        &self,
        strategy: Strategy,
        source: &mut S,
        context: &mut C,
        sinks: &mut F,
    ) -> AttemptOutcome<F::Sink>
    where
        S: MediaSource,
        C: DrawContext,
        F: SinkFactory,
    {
        let sink = match sinks.create(SinkOptions::for_plan(self.plan, self.workers)) {
            Ok(sink) => sink,
            Err(error @ ClipError::EncoderError(_)) => return AttemptOutcome::Failed(error),
            Err(other) => {
                return AttemptOutcome::Failed(ClipError::EncoderError(other.to_string()));
            }
        };
        let mut adapter = EncoderAdapter::new(sink);
        let mut session = ExtractionSession::new(strategy, self.plan.window.start());

        let sampler = Sampler::new(self.plan, self.flag)
            .with_seek_timeout(self.seek_timeout)
            .with_reporter(self.reporter);
        let result = sampler
            .run(&mut session, source, context, &mut |sample| adapter.push(&sample))
            .await;

        match result {
            Ok(()) if adapter.frame_count() == 0 => AttemptOutcome::Failed(
                ClipError::NoFrameAvailable {
                    time: self.plan.window.start(),
                },
            ),
            Ok(()) => {
                log::debug!(
                    "{strategy} extraction captured {} of {} planned frames",
                    adapter.frame_count(),
                    self.plan.frame_count
                );
                AttemptOutcome::Extracted(adapter)
            }
            Err(error) => {
                log::debug!(
                    "Discarding {} frames of the failed {strategy} attempt",
                    adapter.frame_count()
                );
                AttemptOutcome::Failed(error)
            }
        }
    }
}
