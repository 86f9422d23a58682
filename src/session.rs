//! Per-attempt extraction state.

use std::fmt::{Display, Formatter, Result as FmtResult};

use image::RgbaImage;

/// Strategy used to drive the media source through the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Play the clip (optionally sped up) and capture on frame callbacks.
    /// Cheap, but sampling instants are only as exact as the frame cadence.
    Playback,
    /// Seek to every scheduled timestamp. Slow, exact, deterministic.
    Seek,
}

/// Strategy order used when none is configured: playback first, seek as the
/// single fallback.
pub const DEFAULT_STRATEGIES: [Strategy; 2] = [Strategy::Playback, Strategy::Seek];

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Strategy::Playback => f.write_str("playback"),
            Strategy::Seek => f.write_str("seek"),
        }
    }
}

/// Mutable run state of one strategy attempt.
///
/// A fallback attempt always starts from a fresh session; sessions never
/// share state across strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSession {
    /// Strategy this session runs.
    pub strategy: Strategy,
    /// Frames captured so far.
    pub frame_index: u64,
    /// Media time at which the next frame is due.
    pub next_capture_time: f64,
    /// Whether the session is still sampling.
    pub is_active: bool,
}

impl ExtractionSession {
    /// Start a session whose first capture is due at `start`.
    pub fn new(strategy: Strategy, start: f64) -> Self {
        Self {
            strategy,
            frame_index: 0,
            next_capture_time: start,
            is_active: true,
        }
    }

    /// Record one capture and schedule the next one `interval` later.
    pub(crate) fn record_capture(&mut self, interval: f64) {
        self.frame_index += 1;
        self.next_capture_time += interval;
    }

    pub(crate) fn close(&mut self) {
        self.is_active = false;
    }
}

/// One captured frame.
///
/// `pixels` borrows the capture surface, which is repainted for the next
/// frame; a sink has to copy the buffer to keep it.
#[derive(Debug, Clone, Copy)]
pub struct FrameSample<'a> {
    /// Position of the frame within the session.
    pub index: u64,
    /// Media time the frame was captured at, in seconds.
    pub timestamp: f64,
    /// Display delay of the frame in milliseconds.
    pub delay_ms: u32,
    /// Captured pixels at the plan's target size.
    pub pixels: &'a RgbaImage,
}
