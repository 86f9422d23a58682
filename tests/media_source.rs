//! FFmpeg media source integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh` and
//! return early when they are missing.

#![cfg(all(feature = "ffmpeg", feature = "gif"))]

use std::path::Path;

use clipgif::{
    ClipError, ConversionContext, ConversionOptions, FfmpegMediaSource, GifSink, MediaSource,
    SeekOutcome, SizePreset, SoftwareSurface, Strategy,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn audio_only_path() -> &'static str {
    "tests/fixtures/audio_only.m4a"
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn missing_file_is_a_file_open_error() {
    let result = FfmpegMediaSource::open("tests/fixtures/does_not_exist.mp4");
    assert!(matches!(result, Err(ClipError::FileOpen { .. })));
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let path = audio_only_path();
    if !Path::new(path).exists() {
        return;
    }
    let result = FfmpegMediaSource::open(path);
    assert!(matches!(result, Err(ClipError::NoVideoStream)));
}

#[test]
fn open_reports_metadata_and_first_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FfmpegMediaSource::open(path).unwrap();
    assert!((source.duration() - 10.0).abs() < 0.1);
    assert_eq!(source.video_dimensions(), Some((320, 240)));
    assert!((source.frame_rate() - 30.0).abs() < 0.01);
    assert!(source.is_paused());
    assert!(source.displayed_frame().is_some());
}

// ── Seeking ────────────────────────────────────────────────────────

#[tokio::test]
async fn seek_lands_on_the_requested_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FfmpegMediaSource::open(path).unwrap();
    source.set_current_time(4.5).unwrap();
    assert_eq!(source.seek_settled().await, SeekOutcome::Seeked);
    assert!((source.current_time() - 4.5).abs() < 1.0 / 30.0);
    assert!(!source.has_ended());
}

// ── Conversion ─────────────────────────────────────────────────────

#[tokio::test]
async fn both_strategies_convert_the_fixture() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    for strategy in [Strategy::Playback, Strategy::Seek] {
        let mut source = FfmpegMediaSource::open(path).unwrap();
        let options = ConversionOptions::new()
            .with_fps(10)
            .with_size(SizePreset::Small)
            .with_strategies(vec![strategy]);
        let mut context = ConversionContext::new(options);
        context
            .set_window(Some("00:00:02"), Some("00:00:04"), source.duration())
            .unwrap();

        let output = context
            .convert(&mut source, &mut SoftwareSurface::new(), &mut GifSink::new)
            .await
            .unwrap();

        assert_eq!(output.strategy, strategy);
        assert_eq!((output.width, output.height), (320, 240));
        assert!(output.frame_count > 0 && output.frame_count <= 20);
        assert!(output.bytes.starts_with(b"GIF89a"));
        assert!(!source.is_muted());
    }
}
