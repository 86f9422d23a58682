//! Progress reporting and the conversion flag.
//!
//! Progress is a single scalar in `[0, 100]`, split across phases:
//!
//! | Phase | Range |
//! |-------|-------|
//! | [`ConversionPhase::Initializing`] | `[0, 5)` |
//! | [`ConversionPhase::Extracting`] | `[5, 75)`, proportional to frames captured |
//! | [`ConversionPhase::Encoding`] | `[75, 100]`, proportional to encoder progress |
//!
//! [`ConversionFlag`] is the "conversion in progress" flag. It is the only
//! mutual-exclusion primitive of the crate and doubles as cancellation:
//! clearing it makes the running session unwind at its next tick.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use clipgif::{ConversionOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {:.1}% {}", info.phase, info.percent, info.message);
//!     }
//! }
//!
//! let options = ConversionOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::session::Strategy;

/// Upper bound of the initialization phase.
pub const EXTRACTION_START_PERCENT: f32 = 5.0;
/// Upper bound of the extraction phase.
pub const ENCODING_START_PERCENT: f32 = 75.0;

/// The phase a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConversionPhase {
    /// Validating input, planning, preparing the surface and the source.
    Initializing,
    /// Sampling frames with the given strategy.
    Extracting(Strategy),
    /// Waiting on the encoder sink.
    Encoding,
    /// The artifact is ready.
    Finished,
    /// The conversion failed or was cancelled.
    Failed,
}

/// A snapshot of conversion progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What the conversion is doing.
    pub phase: ConversionPhase,
    /// Overall completion, `0.0` to `100.0`.
    pub percent: f32,
    /// Human-readable status line.
    pub message: String,
    /// Frames captured so far in the current session, during extraction.
    pub current_frame: Option<u64>,
    /// Frames expected in the current session, during extraction.
    pub total_frames: Option<u64>,
    /// Wall-clock time since the conversion started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates.
///
/// Callbacks observe but cannot halt the conversion; use
/// [`ConversionFlag::cancel`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the progress scalar or status text changes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// The "conversion in progress" flag.
///
/// Clones share state. [`try_begin`](ConversionFlag::try_begin) raises the
/// flag and hands out a guard that lowers it again on drop;
/// [`cancel`](ConversionFlag::cancel) lowers it early, which the running
/// session observes at its next tick.
///
/// # Example
///
/// ```
/// use clipgif::ConversionFlag;
///
/// let flag = ConversionFlag::new();
/// let guard = flag.try_begin().expect("idle");
/// assert!(flag.is_converting());
/// assert!(flag.try_begin().is_none());
///
/// flag.cancel();
/// assert!(!flag.is_converting());
/// drop(guard);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConversionFlag {
    converting: Arc<AtomicBool>,
}

impl ConversionFlag {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag unless a conversion is already running.
    pub fn try_begin(&self) -> Option<ConversionGuard> {
        self.converting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ConversionGuard { flag: self.clone() })
    }

    /// Request cancellation of the running conversion.
    pub fn cancel(&self) {
        self.converting.store(false, Ordering::Release);
    }

    /// Whether a conversion is running and has not been cancelled.
    pub fn is_converting(&self) -> bool {
        self.converting.load(Ordering::Acquire)
    }
}

/// Lowers the [`ConversionFlag`] it was issued by when dropped.
#[derive(Debug)]
#[must_use = "the conversion flag is lowered as soon as the guard is dropped"]
pub struct ConversionGuard {
    flag: ConversionFlag,
}

impl Drop for ConversionGuard {
    fn drop(&mut self) {
        self.flag.cancel();
    }
}

/// Maps phase-local progress onto the overall scale and emits callbacks.
pub(crate) struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
        }
    }

    /// Report a point inside the initialization phase.
    pub(crate) fn initializing(&self, percent: f32, message: impl Into<String>) {
        let percent = percent.clamp(0.0, EXTRACTION_START_PERCENT);
        self.emit(ConversionPhase::Initializing, percent, message.into(), None);
    }

    /// Report `frame_index` of `frame_count` frames captured.
    pub(crate) fn extracting(
        &self,
        strategy: Strategy,
        frame_index: u64,
        frame_count: u64,
        message: impl Into<String>,
    ) {
        self.emit(
            ConversionPhase::Extracting(strategy),
            extraction_percent(frame_index, frame_count),
            message.into(),
            Some((frame_index, frame_count)),
        );
    }

    /// Report encoder progress as a fraction in `[0, 1]`.
    pub(crate) fn encoding(&self, fraction: f32) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.emit(
            ConversionPhase::Encoding,
            encoding_percent(fraction),
            format!("Encoding GIF {:.0}%", fraction * 100.0),
            None,
        );
    }

    pub(crate) fn encoding_started(&self) {
        self.emit(
            ConversionPhase::Encoding,
            ENCODING_START_PERCENT,
            "Encoding GIF...".to_string(),
            None,
        );
    }

    pub(crate) fn finished(&self) {
        self.emit(
            ConversionPhase::Finished,
            100.0,
            "Conversion complete".to_string(),
            None,
        );
    }

    pub(crate) fn failed(&self, message: impl Into<String>) {
        self.emit(ConversionPhase::Failed, 0.0, message.into(), None);
    }

    fn emit(
        &self,
        phase: ConversionPhase,
        percent: f32,
        message: String,
        frames: Option<(u64, u64)>,
    ) {
        let info = ProgressInfo {
            phase,
            percent: percent.clamp(0.0, 100.0),
            message,
            current_frame: frames.map(|(current, _)| current),
            total_frames: frames.map(|(_, total)| total),
            elapsed: self.start_time.elapsed(),
        };
        self.callback.on_progress(&info);
    }
}

/// Overall percentage for `frame_index` of `frame_count` extracted frames.
pub fn extraction_percent(frame_index: u64, frame_count: u64) -> f32 {
    let span = ENCODING_START_PERCENT - EXTRACTION_START_PERCENT;
    if frame_count == 0 {
        return EXTRACTION_START_PERCENT;
    }
    let ratio = (frame_index.min(frame_count) as f64 / frame_count as f64) as f32;
    EXTRACTION_START_PERCENT + ratio * span
}

/// Overall percentage for an encoder progress fraction in `[0, 1]`.
pub fn encoding_percent(fraction: f32) -> f32 {
    ENCODING_START_PERCENT + fraction.clamp(0.0, 1.0) * (100.0 - ENCODING_START_PERCENT)
}
