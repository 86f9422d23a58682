//! Clip window resolution.
//!
//! A [`ClipWindow`] is the `[start, end)` sub-interval of the source media
//! that gets converted. Raw user input is never rejected: missing or
//! unparseable bounds fall back to the whole media, out-of-range bounds are
//! clamped, and an empty window is widened to (at most) one second. The only
//! hard failure is a media duration that is itself unusable.
//!
//! # Example
//!
//! ```
//! use clipgif::window;
//!
//! let clip = window::resolve(Some("00:00:08"), Some("00:00:03"), 10.0)?;
//! assert_eq!((clip.start(), clip.end()), (8.0, 9.0));
//! # Ok::<(), clipgif::ClipError>(())
//! ```

use crate::error::ClipError;

/// Length of the window selected when media metadata first loads.
pub const DEFAULT_WINDOW_SECONDS: f64 = 5.0;

/// Minimum width an empty window is widened to.
const MINIMUM_WINDOW_SECONDS: f64 = 1.0;

/// A validated clip window, always satisfying `0 ≤ start < end ≤ duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct ClipWindow {
    start: f64,
    end: f64,
}

impl ClipWindow {
    /// The window selected when metadata loads: `[0, min(duration, 5)]`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidDuration`] for a zero, negative, or
    /// non-finite duration.
    pub fn default_for(duration: f64) -> Result<Self, ClipError> {
        check_duration(duration)?;
        Ok(Self {
            start: 0.0,
            end: duration.min(DEFAULT_WINDOW_SECONDS),
        })
    }

    /// Start of the window in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End of the window in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the window in seconds. Always positive.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Resolve raw `HH:MM:SS` bounds into a [`ClipWindow`].
///
/// Bounds that are missing or fail [`parse_time`] default to `0` and
/// `duration` respectively.
///
/// # Errors
///
/// Returns [`ClipError::InvalidDuration`] if `duration` is zero, negative, or
/// non-finite. Bad time input never fails.
pub fn resolve(
    raw_start: Option<&str>,
    raw_end: Option<&str>,
    duration: f64,
) -> Result<ClipWindow, ClipError> {
    resolve_seconds(
        raw_start.and_then(parse_time),
        raw_end.and_then(parse_time),
        duration,
    )
}

/// Resolve numeric bounds (seconds) into a [`ClipWindow`].
///
/// Non-finite bounds are treated as missing.
///
/// # Errors
///
/// Returns [`ClipError::InvalidDuration`] if `duration` is unusable.
pub fn resolve_seconds(
    start: Option<f64>,
    end: Option<f64>,
    duration: f64,
) -> Result<ClipWindow, ClipError> {
    check_duration(duration)?;

    let start = start.filter(|value| value.is_finite()).unwrap_or(0.0);
    let end = end.filter(|value| value.is_finite()).unwrap_or(duration);

    let mut start = start.clamp(0.0, duration);
    let mut end = end.clamp(0.0, duration);

    if end <= start {
        end = (start + MINIMUM_WINDOW_SECONDS).min(duration);
    }
    // Start was pinned to the very end of the media.
    if end <= start {
        start = (end - MINIMUM_WINDOW_SECONDS).max(0.0);
    }

    log::debug!("Resolved clip window [{start:.3}, {end:.3}] of {duration:.3}s");
    Ok(ClipWindow { start, end })
}

/// Parse a strict `HH:MM:SS` time code into seconds.
///
/// All three fields must be non-negative integers; minutes and seconds must
/// be below 60. Returns `None` for anything else.
pub fn parse_time(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours = parts[0].trim().parse::<u64>().ok()?;
    let minutes = parts[1].trim().parse::<u64>().ok()?;
    let seconds = parts[2].trim().parse::<u64>().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?;
    Some(total as f64)
}

/// Format seconds as `HH:MM:SS`, truncating fractions.
///
/// Non-finite or negative input renders as `--:--:--`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--:--".to_string();
    }
    let total = seconds.floor() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

fn check_duration(duration: f64) -> Result<(), ClipError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(ClipError::InvalidDuration(duration))
    }
}
