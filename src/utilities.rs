//! Internal utility functions.
//!
//! Pixel-data copying and timestamp conversion shared by the FFmpeg media
//! source.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Microseconds per second, FFmpeg's `AV_TIME_BASE`.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bytes per
/// pixel). The padding is stripped so the result can be passed directly to
/// [`image::RgbaImage::from_raw`].
pub fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let rows = height as usize;
    let data = video_frame.data(0);

    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in data.chunks(stride).take(rows) {
        buffer.extend_from_slice(&row[..row_bytes]);
    }
    buffer
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert seconds to a container-level seek target in `AV_TIME_BASE` units.
pub fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * AV_TIME_BASE).round() as i64
}

/// Convert a container duration in `AV_TIME_BASE` units to seconds.
pub fn container_duration_seconds(duration: i64) -> f64 {
    if duration > 0 {
        duration as f64 / AV_TIME_BASE
    } else {
        0.0
    }
}

/// Frames per second of a rational rate, or `0.0` when undefined.
pub fn rational_to_fps(rate: Rational) -> f64 {
    if rate.denominator() == 0 || rate.numerator() <= 0 {
        0.0
    } else {
        rate.numerator() as f64 / rate.denominator() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_rescales_by_time_base() {
        assert_eq!(pts_to_seconds(90_000, Rational::new(1, 90_000)), 1.0);
        assert_eq!(pts_to_seconds(5, Rational::new(1, 0)), 0.0);
    }

    #[test]
    fn seek_timestamps_are_microseconds() {
        assert_eq!(seconds_to_seek_timestamp(2.5), 2_500_000);
        assert_eq!(seconds_to_seek_timestamp(-1.0), 0);
        assert_eq!(container_duration_seconds(-5), 0.0);
        assert_eq!(container_duration_seconds(10_000_000), 10.0);
    }

    #[test]
    fn undefined_rates_are_zero() {
        assert_eq!(rational_to_fps(Rational::new(30_000, 1001)), 30_000.0 / 1001.0);
        assert_eq!(rational_to_fps(Rational::new(0, 0)), 0.0);
    }
}
