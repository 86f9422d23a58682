//! Conversion configuration.
//!
//! [`ConversionOptions`] is a builder carrying the user-selected encoding
//! settings plus the operational knobs (progress callback, seek timeout,
//! worker mode, strategy order) through a conversion without widening every
//! function signature.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use clipgif::{ConversionOptions, SizePreset, Strategy};
//!
//! let options = ConversionOptions::new()
//!     .with_fps(12)
//!     .with_size(SizePreset::Small)
//!     .with_speed(4.0)
//!     .with_seek_timeout(Duration::from_secs(2))
//!     .with_strategies(vec![Strategy::Seek]);
//! assert_eq!(options.fps(), 12);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::plan::SizePreset;
use crate::progress::{NoOpProgress, ProgressCallback};
use crate::sampler::DEFAULT_SEEK_TIMEOUT;
use crate::session::{DEFAULT_STRATEGIES, Strategy};
use crate::sink::WorkerMode;

/// Frame rate used when none is configured.
pub const DEFAULT_FPS: u32 = 15;
/// Encoder quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 10;

/// Settings for one conversion.
#[derive(Clone)]
pub struct ConversionOptions {
    pub(crate) fps: u32,
    pub(crate) quality: u8,
    pub(crate) speed: f64,
    pub(crate) looping: bool,
    pub(crate) size: SizePreset,
    pub(crate) seek_timeout: Duration,
    pub(crate) workers: WorkerMode,
    pub(crate) strategies: Vec<Strategy>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for ConversionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConversionOptions")
            .field("fps", &self.fps)
            .field("quality", &self.quality)
            .field("speed", &self.speed)
            .field("looping", &self.looping)
            .field("size", &self.size)
            .field("seek_timeout", &self.seek_timeout)
            .field("workers", &self.workers)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionOptions {
    /// Defaults: 15 fps, quality 10, 1x speed, looping, medium size, 5 s seek
    /// timeout, automatic workers, playback then seek, no progress callback.
    pub fn new() -> Self {
        Self {
            fps: DEFAULT_FPS,
            quality: DEFAULT_QUALITY,
            speed: 1.0,
            looping: true,
            size: SizePreset::default(),
            seek_timeout: DEFAULT_SEEK_TIMEOUT,
            workers: WorkerMode::Auto,
            strategies: DEFAULT_STRATEGIES.to_vec(),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Sampling frame rate. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Encoder quality, `1` (best) to `30` (fastest).
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Playback rate for the playback strategy, capped into `[1, 8]` when
    /// planned.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Whether the GIF loops forever.
    #[must_use]
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Output size preset.
    #[must_use]
    pub fn with_size(mut self, size: SizePreset) -> Self {
        self.size = size;
        self
    }

    /// Bound on every individual seek.
    #[must_use]
    pub fn with_seek_timeout(mut self, timeout: Duration) -> Self {
        self.seek_timeout = timeout;
        self
    }

    /// Worker mode for the encoder sink.
    #[must_use]
    pub fn with_workers(mut self, workers: WorkerMode) -> Self {
        self.workers = workers;
        self
    }

    /// Strategies to try, in order. Each is tried at most once; an empty list
    /// restores the default order.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        let mut ordered: Vec<Strategy> = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            if !ordered.contains(&strategy) {
                ordered.push(strategy);
            }
        }
        self.strategies = if ordered.is_empty() {
            DEFAULT_STRATEGIES.to_vec()
        } else {
            ordered
        };
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Sampling frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Encoder quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Requested playback rate.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Whether the GIF loops forever.
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Output size preset.
    pub fn size(&self) -> SizePreset {
        self.size
    }

    /// Strategies tried, in order.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }
}
