//! GIF sink integration tests.

#![cfg(feature = "gif")]

mod common;

use clipgif::{
    ConversionContext, ConversionOptions, EncoderAdapter, EncoderSink, FrameSample, GifSink,
    SinkOptions, SoftwareSurface, Strategy, WorkerMode,
};
use image::{Rgba, RgbaImage};

use common::SimulatedVideo;

fn options(workers: usize) -> SinkOptions {
    SinkOptions {
        workers,
        quality: 10,
        width: 32,
        height: 24,
        repeat: None,
    }
}

fn gradient(shade: u8) -> RgbaImage {
    RgbaImage::from_fn(32, 24, |x, y| Rgba([shade, (x * 8) as u8, (y * 10) as u8, 255]))
}

// ── Rendering ──────────────────────────────────────────────────────

#[tokio::test]
async fn threaded_sink_renders_through_the_adapter() {
    let sink = GifSink::new(options(2)).unwrap();
    assert!(sink.is_threaded());

    let mut adapter = EncoderAdapter::new(sink);
    for index in 0..6_u64 {
        let pixels = gradient(index as u8 * 40);
        adapter.push(&FrameSample {
            index,
            timestamp: index as f64 / 10.0,
            delay_ms: 100,
            pixels: &pixels,
        });
    }
    assert_eq!(adapter.frame_count(), 6);

    let bytes = adapter.render().await.unwrap();
    assert!(bytes.starts_with(b"GIF89a"));
    assert_eq!(bytes.last(), Some(&0x3B));
}

#[test]
fn inline_sink_renders_without_a_runtime() {
    let mut sink = GifSink::new(options(0)).unwrap();
    sink.add_frame(&gradient(0), 40);
    sink.add_frame(&gradient(200), 40);

    let mut events = sink.render().unwrap();
    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let clipgif::SinkEvent::Finished(bytes) = event {
            finished = Some(bytes);
        }
    }
    assert!(finished.unwrap().starts_with(b"GIF89a"));
}

// ── End to end ─────────────────────────────────────────────────────

#[tokio::test]
async fn conversion_writes_a_gif_file() {
    for workers in [WorkerMode::Inline, WorkerMode::Threads(2)] {
        let mut video = SimulatedVideo::new(3.0);
        let mut context = ConversionContext::new(
            ConversionOptions::new()
                .with_fps(5)
                .with_strategies(vec![Strategy::Seek])
                .with_workers(workers),
        );
        context.load_metadata(video.duration).unwrap();

        let output = context
            .convert(&mut video, &mut SoftwareSurface::new(), &mut GifSink::new)
            .await
            .unwrap();
        assert_eq!(output.frame_count, 15);
        assert!(output.bytes.starts_with(b"GIF89a"));
        assert!(output.human_size().ends_with("KB"));

        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("clip.gif");
        output.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), output.bytes);
    }
}
