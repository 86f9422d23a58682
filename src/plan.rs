//! Extraction planning.
//!
//! An [`ExtractionPlan`] fixes every parameter of one conversion attempt:
//! sampling interval, expected frame count, canvas size, and the encoder
//! settings the sink is built with. It is computed once per conversion and
//! never mutated afterwards.

use crate::window::ClipWindow;

/// Lowest and highest accepted encoder quality (lower is better, as in the
/// GIF quantizer's speed setting).
pub const QUALITY_RANGE: (u8, u8) = (1, 30);

/// Lowest and highest playback rate used while extracting.
pub const SPEED_RANGE: (f64, f64) = (1.0, 8.0);

/// Absorbs floating-point noise in `duration * fps` before rounding up.
const FRAME_COUNT_EPSILON: f64 = 1e-9;

/// Nominal output width, scaled to the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePreset {
    /// 320 pixels wide.
    Small,
    /// 480 pixels wide. This is the default.
    #[default]
    Medium,
    /// 720 pixels wide.
    Large,
    /// Keep the source resolution.
    Original,
}

impl SizePreset {
    /// Nominal width for this preset, `None` for [`SizePreset::Original`].
    pub fn nominal_width(self) -> Option<u32> {
        match self {
            SizePreset::Small => Some(320),
            SizePreset::Medium => Some(480),
            SizePreset::Large => Some(720),
            SizePreset::Original => None,
        }
    }

    /// Resolve output dimensions for a source of the given size.
    ///
    /// Never upscales beyond the source width. Returns `None` when either
    /// source dimension is zero.
    pub fn resolve_dimensions(self, source_width: u32, source_height: u32) -> Option<(u32, u32)> {
        if source_width == 0 || source_height == 0 {
            return None;
        }
        match self.nominal_width() {
            None => Some((source_width, source_height)),
            Some(nominal) => {
                let width = nominal.min(source_width);
                let aspect = source_width as f64 / source_height as f64;
                let height = (width as f64 / aspect).round() as u32;
                Some((width, height.max(1)))
            }
        }
    }
}

/// Immutable parameters of one extraction session.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ExtractionPlan {
    /// The clip window being sampled.
    pub window: ClipWindow,
    /// Sampling frame rate.
    pub fps: u32,
    /// Seconds between samples (`1 / fps`).
    pub frame_interval: f64,
    /// Number of samples the seek strategy produces (`ceil(len * fps)`, ≥ 1).
    pub frame_count: u64,
    /// Display delay attached to each sample, in milliseconds.
    pub frame_delay_ms: u32,
    /// Output width in pixels.
    pub target_width: u32,
    /// Output height in pixels.
    pub target_height: u32,
    /// Encoder quality, within [`QUALITY_RANGE`].
    pub quality: u8,
    /// Whether the animation loops forever.
    pub looping: bool,
    /// Playback rate used by the playback strategy, within [`SPEED_RANGE`].
    pub speed_multiplier: f64,
}

impl ExtractionPlan {
    /// Timestamp of the `index`-th scheduled sample.
    pub fn timestamp_of(&self, index: u64) -> f64 {
        self.window.start() + index as f64 * self.frame_interval
    }

    /// Frames captured between playback progress reports.
    pub(crate) fn progress_every(&self) -> u64 {
        ((self.fps as f64 / 2.0).round() as u64).max(1)
    }
}

/// Build an [`ExtractionPlan`].
///
/// Returns `None` when `source_size` is unknown or degenerate; the caller
/// must abort the conversion.
pub fn plan(
    window: ClipWindow,
    fps: u32,
    size: SizePreset,
    source_size: Option<(u32, u32)>,
    quality: u8,
    looping: bool,
    speed: f64,
) -> Option<ExtractionPlan> {
    let (source_width, source_height) = source_size?;
    let (target_width, target_height) = size.resolve_dimensions(source_width, source_height)?;

    let fps = fps.max(1);
    let frame_interval = 1.0 / fps as f64;
    let frame_count = frame_count_for(window.length(), fps);
    let speed_multiplier = if speed.is_finite() {
        speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
    } else {
        SPEED_RANGE.0
    };

    let plan = ExtractionPlan {
        window,
        fps,
        frame_interval,
        frame_count,
        frame_delay_ms: (1000.0 / fps as f64).round() as u32,
        target_width,
        target_height,
        quality: quality.clamp(QUALITY_RANGE.0, QUALITY_RANGE.1),
        looping,
        speed_multiplier,
    };
    log::debug!(
        "Planned {} frames at {} fps ({}x{}, quality {}, speed {}x)",
        plan.frame_count,
        plan.fps,
        plan.target_width,
        plan.target_height,
        plan.quality,
        plan.speed_multiplier,
    );
    Some(plan)
}

/// `ceil(length * fps)`, never below one.
pub fn frame_count_for(length: f64, fps: u32) -> u64 {
    let exact = length.max(0.0) * fps.max(1) as f64;
    ((exact - FRAME_COUNT_EPSILON).ceil() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::resolve_seconds;

    fn window(start: f64, end: f64, duration: f64) -> ClipWindow {
        resolve_seconds(Some(start), Some(end), duration).unwrap()
    }

    #[test]
    fn five_second_window_at_ten_fps() {
        let plan = plan(
            window(2.0, 7.0, 10.0),
            10,
            SizePreset::Original,
            Some((640, 360)),
            10,
            true,
            1.0,
        )
        .unwrap();
        assert_eq!(plan.frame_count, 50);
        assert_eq!(plan.frame_delay_ms, 100);
        assert!((plan.frame_interval - 0.1).abs() < 1e-12);
        assert_eq!((plan.target_width, plan.target_height), (640, 360));
    }

    #[test]
    fn frame_count_rounds_up_and_is_never_zero() {
        assert_eq!(frame_count_for(4.9, 10), 49);
        assert_eq!(frame_count_for(0.05, 10), 1);
        assert_eq!(frame_count_for(1.01, 15), 16);
        assert_eq!(frame_count_for(0.0, 30), 1);
        for fps in 1..=60 {
            for tenths in 1..100 {
                assert!(frame_count_for(tenths as f64 / 10.0, fps) >= 1);
            }
        }
    }

    #[test]
    fn presets_scale_to_aspect_and_never_upscale() {
        assert_eq!(SizePreset::Small.resolve_dimensions(1920, 1080), Some((320, 180)));
        assert_eq!(SizePreset::Medium.resolve_dimensions(1920, 1080), Some((480, 270)));
        assert_eq!(SizePreset::Large.resolve_dimensions(640, 480), Some((640, 480)));
        assert_eq!(SizePreset::Original.resolve_dimensions(1280, 720), Some((1280, 720)));
        assert_eq!(SizePreset::Small.resolve_dimensions(0, 720), None);
    }

    #[test]
    fn unknown_source_size_yields_no_plan() {
        let result = plan(
            window(0.0, 1.0, 5.0),
            15,
            SizePreset::Medium,
            None,
            10,
            true,
            1.0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn speed_and_quality_are_clamped() {
        let plan = plan(
            window(0.0, 1.0, 5.0),
            0,
            SizePreset::Small,
            Some((320, 240)),
            99,
            false,
            20.0,
        )
        .unwrap();
        assert_eq!(plan.fps, 1);
        assert_eq!(plan.quality, 30);
        assert_eq!(plan.speed_multiplier, 8.0);
        assert_eq!(plan.progress_every(), 1);
    }
}
