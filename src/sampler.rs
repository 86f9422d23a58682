//! Frame sampling strategies.
//!
//! A [`Sampler`] drives a [`MediaSource`] through an [`ExtractionPlan`] and
//! hands every captured frame to a caller-supplied closure, strictly in
//! timestamp order:
//!
//! - **Seek** visits `start + i / fps` for every `i < frame_count`, waiting
//!   for each seek to settle and a fresh frame to be presented. The output is
//!   exactly `frame_count` evenly spaced frames.
//! - **Playback** plays the clip at the plan's rate and captures whenever the
//!   playback position reaches the next scheduled instant. It is much cheaper
//!   but only as precise as the frame cadence: a long gap between presented
//!   frames skips scheduled samples, so it never promises an exact count.
//!
//! Both strategies check the [`ConversionFlag`] before every unit of work and
//! fail with [`ClipError::Cancelled`] once it is lowered.

use std::time::Duration;

use image::RgbaImage;

use crate::canvas::DrawContext;
use crate::error::ClipError;
use crate::media::{MediaSource, SeekOutcome};
use crate::plan::ExtractionPlan;
use crate::progress::{ConversionFlag, ProgressReporter};
use crate::session::{ExtractionSession, FrameSample, Strategy};

/// Default bound on a single seek.
pub const DEFAULT_SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// A seek closer than this to the current position is skipped.
const SEEK_TOLERANCE: f64 = 0.001;

/// Slack allowed past the window end for the last scheduled sample.
const WINDOW_TOLERANCE: f64 = 1e-3;

/// Playback position slack when deciding whether a capture is due.
const CAPTURE_TOLERANCE: f64 = 0.002;

/// Seek `source` to `time` and wait for the seek to settle.
///
/// Non-finite targets seek to `0`, negative ones are clamped to `0`. When
/// the source is already within a millisecond of the target no seek is
/// issued.
///
/// # Errors
///
/// - [`ClipError::SeekTimeout`] if the seek does not settle within `timeout`.
/// - [`ClipError::SeekError`] if the source reports a failure or refuses
///   the seek.
pub async fn seek_to<S: MediaSource>(
    source: &mut S,
    time: f64,
    timeout: Duration,
) -> Result<(), ClipError> {
    let target = clamp_target(time);
    if (source.current_time() - target).abs() < SEEK_TOLERANCE {
        return Ok(());
    }
    settle_at(source, target, timeout).await
}

/// Seek `source` to `time` even when it already reports that position.
///
/// A seek abandoned by an earlier timeout can leave its target in
/// [`MediaSource::current_time`] while another frame is still on display,
/// so each session opens with one of these.
///
/// # Errors
///
/// Same as [`seek_to`].
pub async fn force_seek<S: MediaSource>(
    source: &mut S,
    time: f64,
    timeout: Duration,
) -> Result<(), ClipError> {
    settle_at(source, clamp_target(time), timeout).await
}

fn clamp_target(time: f64) -> f64 {
    if time.is_finite() { time.max(0.0) } else { 0.0 }
}

async fn settle_at<S: MediaSource>(
    source: &mut S,
    target: f64,
    timeout: Duration,
) -> Result<(), ClipError> {
    source
        .set_current_time(target)
        .map_err(|error| ClipError::SeekError {
            time: target,
            reason: error.to_string(),
        })?;

    match tokio::time::timeout(timeout, source.seek_settled()).await {
        Ok(SeekOutcome::Seeked) => Ok(()),
        Ok(SeekOutcome::Failed(reason)) => Err(ClipError::SeekError {
            time: target,
            reason,
        }),
        Err(_) => Err(ClipError::SeekTimeout {
            time: target,
            timeout,
        }),
    }
}

/// Wait until a newly decoded frame is on display.
///
/// Uses the source's video-frame signal when it has one, otherwise waits two
/// paint cycles.
pub async fn wait_for_video_frame<S: MediaSource>(source: &mut S) {
    if source.supports_video_frame_callback() {
        source.next_video_frame().await;
    } else {
        source.next_paint().await;
        source.next_paint().await;
    }
}

/// Paint the displayed frame into `context` and return the pixels.
fn capture<'c, S: MediaSource, C: DrawContext>(
    source: &S,
    context: &'c mut C,
) -> Result<&'c RgbaImage, ClipError> {
    let frame = source
        .displayed_frame()
        .ok_or_else(|| ClipError::NoFrameAvailable {
            time: source.current_time(),
        })?;
    context.draw_frame(frame)?;
    Ok(context.pixels())
}

/// Runs one [`ExtractionSession`] against a plan.
pub struct Sampler<'a> {
    plan: &'a ExtractionPlan,
    flag: &'a ConversionFlag,
    seek_timeout: Duration,
    reporter: Option<&'a ProgressReporter>,
}

impl<'a> Sampler<'a> {
    /// Create a sampler for `plan`, cancelled through `flag`.
    pub fn new(plan: &'a ExtractionPlan, flag: &'a ConversionFlag) -> Self {
        Self {
            plan,
            flag,
            seek_timeout: DEFAULT_SEEK_TIMEOUT,
            reporter: None,
        }
    }

    /// Bound every seek by `timeout` instead of [`DEFAULT_SEEK_TIMEOUT`].
    #[must_use]
    pub fn with_seek_timeout(mut self, timeout: Duration) -> Self {
        self.seek_timeout = timeout;
        self
    }

    #[must_use]
    pub(crate) fn with_reporter(mut self, reporter: &'a ProgressReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Sample with the session's strategy, passing each frame to `emit`.
    ///
    /// The session is closed on return, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Seek, playback and capture errors of the strategy, or
    /// [`ClipError::Cancelled`].
    pub async fn run<S: MediaSource, C: DrawContext>(
        &self,
        session: &mut ExtractionSession,
        source: &mut S,
        context: &mut C,
        emit: &mut dyn FnMut(FrameSample<'_>),
    ) -> Result<(), ClipError> {
        log::debug!(
            "Sampling {} frames with the {} strategy",
            self.plan.frame_count,
            session.strategy
        );
        let result = match session.strategy {
            Strategy::Seek => self.sample_by_seeking(session, source, context, emit).await,
            Strategy::Playback => {
                self.sample_by_playback(session, source, context, emit)
                    .await
            }
        };
        session.close();
        result
    }

    async fn sample_by_seeking<S: MediaSource, C: DrawContext>(
        &self,
        session: &mut ExtractionSession,
        source: &mut S,
        context: &mut C,
        emit: &mut dyn FnMut(FrameSample<'_>),
    ) -> Result<(), ClipError> {
        let plan = self.plan;
        self.report(session, "Seeking to clip start...".to_string());
        force_seek(source, plan.window.start(), self.seek_timeout).await?;
        wait_for_video_frame(source).await;

        while session.frame_index < plan.frame_count {
            let timestamp = plan.timestamp_of(session.frame_index);
            if timestamp > plan.window.end() + WINDOW_TOLERANCE {
                break;
            }
            if !self.flag.is_converting() {
                log::info!("Seek sampling cancelled at frame {}", session.frame_index);
                return Err(ClipError::Cancelled);
            }
            self.report(
                session,
                format!(
                    "Extracting frame {}/{}",
                    session.frame_index + 1,
                    plan.frame_count
                ),
            );

            seek_to(source, timestamp, self.seek_timeout).await?;
            wait_for_video_frame(source).await;

            let pixels = capture(source, context)?;
            emit(FrameSample {
                index: session.frame_index,
                timestamp,
                delay_ms: plan.frame_delay_ms,
                pixels,
            });
            session.record_capture(plan.frame_interval);
            session.next_capture_time = plan.timestamp_of(session.frame_index);
        }

        Ok(())
    }

    async fn sample_by_playback<S: MediaSource, C: DrawContext>(
        &self,
        session: &mut ExtractionSession,
        source: &mut S,
        context: &mut C,
        emit: &mut dyn FnMut(FrameSample<'_>),
    ) -> Result<(), ClipError> {
        self.report(session, "Seeking to clip start...".to_string());
        force_seek(source, self.plan.window.start(), self.seek_timeout).await?;
        wait_for_video_frame(source).await;

        self.report(
            session,
            format!(
                "Extracting frames at {}x playback...",
                source.playback_rate()
            ),
        );
        source.play().await?;

        let result = self.playback_ticks(session, source, context, emit).await;
        source.pause();
        result
    }

    async fn playback_ticks<S: MediaSource, C: DrawContext>(
        &self,
        session: &mut ExtractionSession,
        source: &mut S,
        context: &mut C,
        emit: &mut dyn FnMut(FrameSample<'_>),
    ) -> Result<(), ClipError> {
        let plan = self.plan;
        let end = plan.window.end();
        let progress_every = plan.progress_every();

        loop {
            if !self.flag.is_converting() {
                log::info!("Playback sampling cancelled at frame {}", session.frame_index);
                return Err(ClipError::Cancelled);
            }

            let now = source.current_time();
            if now + CAPTURE_TOLERANCE >= session.next_capture_time {
                if now > end + plan.frame_interval {
                    log::debug!("Playback overshot the clip window at {now:.3}s");
                    return Ok(());
                }

                let pixels = capture(source, context)?;
                emit(FrameSample {
                    index: session.frame_index,
                    timestamp: now,
                    delay_ms: plan.frame_delay_ms,
                    pixels,
                });
                session.record_capture(plan.frame_interval);

                if session.frame_index % progress_every == 0
                    || session.frame_index == plan.frame_count
                {
                    self.report(
                        session,
                        format!(
                            "Extracting frame {}/{}",
                            session.frame_index, plan.frame_count
                        ),
                    );
                }
                if session.frame_index >= plan.frame_count
                    || session.next_capture_time > end + WINDOW_TOLERANCE
                {
                    return Ok(());
                }
            }

            if source.has_ended() {
                log::debug!("Source ended after {} frames", session.frame_index);
                return Ok(());
            }

            if source.supports_video_frame_callback() {
                source.next_video_frame().await;
            } else {
                source.next_paint().await;
            }
        }
    }

    fn report(&self, session: &ExtractionSession, message: String) {
        if let Some(reporter) = self.reporter {
            reporter.extracting(
                session.strategy,
                session.frame_index,
                self.plan.frame_count,
                message,
            );
        }
    }
}
