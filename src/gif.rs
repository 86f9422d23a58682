//! GIF encoder sink.
//!
//! [`GifSink`] implements [`EncoderSink`] on top of the `gif` crate. Frames
//! are copied when queued. Rendering quantizes every frame to a 256-colour
//! palette with the `gif` crate's quantizer and writes the animation into
//! memory.
//!
//! With `workers > 0` the quantizer runs on a dedicated `rayon` pool inside
//! [`tokio::task::spawn_blocking`], so the calling task keeps receiving
//! progress events. With `workers == 0`, or outside a Tokio runtime, the whole
//! render happens synchronously inside [`render`](EncoderSink::render) and the
//! returned channel already holds every event.
//!
//! # Example
//!
//! ```no_run
//! use clipgif::{EncoderSink, GifSink, SinkEvent, SinkOptions};
//! use image::RgbaImage;
//!
//! let mut sink = GifSink::new(SinkOptions {
//!     workers: 0,
//!     quality: 10,
//!     width: 64,
//!     height: 48,
//!     repeat: None,
//! })?;
//! sink.add_frame(&RgbaImage::new(64, 48), 100);
//!
//! let mut events = sink.render()?;
//! while let Ok(event) = events.try_recv() {
//!     if let SinkEvent::Finished(bytes) = event {
//!         std::fs::write("blank.gif", bytes)?;
//!     }
//! }
//! # Ok::<(), clipgif::ClipError>(())
//! ```

use std::sync::Arc;

use gif::{Encoder, Frame, Repeat};
use image::{RgbaImage, imageops};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::ClipError;
use crate::plan::QUALITY_RANGE;
use crate::sink::{EncoderSink, SinkEvent, SinkOptions};

/// A queued frame and its display time in milliseconds.
type QueuedFrame = (RgbaImage, u32);

/// In-memory animated GIF encoder.
pub struct GifSink {
    options: SinkOptions,
    frames: Vec<QueuedFrame>,
    pool: Option<Arc<ThreadPool>>,
    rendered: bool,
}

impl GifSink {
    /// Create a sink for frames of `options.width` × `options.height`.
    ///
    /// If the worker pool cannot be built the sink degrades to synchronous
    /// encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::EncoderError`] if the dimensions are zero or do
    /// not fit a GIF logical screen.
    pub fn new(options: SinkOptions) -> Result<Self, ClipError> {
        gif_dimensions(&options).map_err(ClipError::EncoderError)?;

        let pool = if options.workers > 0 {
            match ThreadPoolBuilder::new()
                .num_threads(options.workers)
                .thread_name(|index| format!("clipgif-encoder-{index}"))
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(error) => {
                    log::warn!("Could not start GIF encoder workers, encoding inline: {error}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            options,
            frames: Vec::new(),
            pool,
            rendered: false,
        })
    }

    /// Frames queued so far.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sink encodes on background workers.
    pub fn is_threaded(&self) -> bool {
        self.pool.is_some()
    }
}

impl EncoderSink for GifSink {
    fn add_frame(&mut self, pixels: &RgbaImage, delay_ms: u32) {
        let (width, height) = (self.options.width, self.options.height);
        let frame = if pixels.dimensions() == (width, height) {
            pixels.clone()
        } else {
            log::debug!(
                "Resizing {}x{} frame to {width}x{height}",
                pixels.width(),
                pixels.height()
            );
            imageops::resize(pixels, width, height, imageops::FilterType::Triangle)
        };
        self.frames.push((frame, delay_ms));
    }

    fn render(&mut self) -> Result<UnboundedReceiver<SinkEvent>, ClipError> {
        if self.rendered {
            return Err(ClipError::EncoderError(
                "GIF sink was already rendered".to_string(),
            ));
        }
        self.rendered = true;

        let (sender, receiver) = unbounded_channel();
        let job = EncodeJob {
            options: self.options,
            frames: std::mem::take(&mut self.frames),
            pool: self.pool.clone(),
        };

        match (&self.pool, tokio::runtime::Handle::try_current()) {
            (Some(_), Ok(handle)) => {
                log::debug!(
                    "Encoding {} frames on {} workers",
                    job.frames.len(),
                    self.options.workers
                );
                handle.spawn_blocking(move || job.run(&sender));
            }
            _ => {
                log::debug!("Encoding {} frames inline", job.frames.len());
                job.run(&sender);
            }
        }
        Ok(receiver)
    }
}

/// Everything one render needs, movable onto a blocking thread.
struct EncodeJob {
    options: SinkOptions,
    frames: Vec<QueuedFrame>,
    pool: Option<Arc<ThreadPool>>,
}

impl EncodeJob {
    fn run(self, events: &UnboundedSender<SinkEvent>) {
        let event = match self.encode(events) {
            Ok(bytes) => SinkEvent::Finished(bytes),
            Err(reason) => SinkEvent::Error(reason),
        };
        // The receiver may be gone if the conversion was dropped.
        let _ = events.send(event);
    }

    fn encode(mut self, events: &UnboundedSender<SinkEvent>) -> Result<Vec<u8>, String> {
        let (width, height) = gif_dimensions(&self.options)?;
        let total = self.frames.len();
        if total == 0 {
            return Err("No frames to encode".to_string());
        }
        let speed = i32::from(self.options.quality.clamp(QUALITY_RANGE.0, QUALITY_RANGE.1));
        let repeat = match self.options.repeat {
            None => Repeat::Infinite,
            Some(count) => Repeat::Finite(count),
        };
        let chunk_size = self.options.workers.max(1) * 2;

        let mut buffer = Vec::new();
        {
            let mut encoder = Encoder::new(&mut buffer, width, height, &[])
                .map_err(|error| format!("Failed to create GIF encoder: {error}"))?;
            encoder
                .set_repeat(repeat)
                .map_err(|error| format!("Failed to set GIF repeat: {error}"))?;

            let mut written = 0;
            for chunk in self.frames.chunks_mut(chunk_size) {
                let quantized: Vec<Frame<'static>> = match &self.pool {
                    Some(pool) => pool.install(|| {
                        chunk
                            .par_iter_mut()
                            .map(|queued| quantize(queued, width, height, speed))
                            .collect()
                    }),
                    None => chunk
                        .iter_mut()
                        .map(|queued| quantize(queued, width, height, speed))
                        .collect(),
                };

                for frame in &quantized {
                    encoder
                        .write_frame(frame)
                        .map_err(|error| format!("Failed to write GIF frame: {error}"))?;
                    written += 1;
                    let _ = events.send(SinkEvent::Progress(written as f32 / total as f32));
                }
            }
        }

        Ok(buffer)
    }
}

fn quantize(queued: &mut QueuedFrame, width: u16, height: u16, speed: i32) -> Frame<'static> {
    let (image, delay_ms) = queued;
    let mut frame = Frame::from_rgba_speed(width, height, &mut **image, speed);
    frame.delay = delay_centiseconds(*delay_ms);
    frame
}

/// GIF frame delays are in hundredths of a second.
fn delay_centiseconds(delay_ms: u32) -> u16 {
    (f64::from(delay_ms) / 10.0).round().min(f64::from(u16::MAX)) as u16
}

fn gif_dimensions(options: &SinkOptions) -> Result<(u16, u16), String> {
    match (u16::try_from(options.width), u16::try_from(options.height)) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(format!(
            "Unsupported GIF size {}x{}",
            options.width, options.height
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(workers: usize, repeat: Option<u16>) -> SinkOptions {
        SinkOptions {
            workers,
            quality: 10,
            width: 8,
            height: 6,
            repeat,
        }
    }

    fn drain(mut receiver: UnboundedReceiver<SinkEvent>) -> Vec<SinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn delays_round_to_centiseconds() {
        assert_eq!(delay_centiseconds(100), 10);
        assert_eq!(delay_centiseconds(67), 7);
        assert_eq!(delay_centiseconds(33), 3);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut too_wide = options(0, None);
        too_wide.width = 70_000;
        assert!(matches!(GifSink::new(too_wide), Err(ClipError::EncoderError(_))));

        let mut empty = options(0, None);
        empty.height = 0;
        assert!(GifSink::new(empty).is_err());
    }

    #[test]
    fn inline_render_emits_every_event_synchronously() {
        let mut sink = GifSink::new(options(0, Some(1))).unwrap();
        assert!(!sink.is_threaded());
        sink.add_frame(&RgbaImage::from_pixel(8, 6, image::Rgba([255, 0, 0, 255])), 100);
        sink.add_frame(&RgbaImage::from_pixel(16, 12, image::Rgba([0, 0, 255, 255])), 100);

        let events = drain(sink.render().unwrap());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], SinkEvent::Progress(0.5));
        assert_eq!(events[1], SinkEvent::Progress(1.0));
        match &events[2] {
            SinkEvent::Finished(bytes) => assert!(bytes.starts_with(b"GIF89a")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn empty_sink_reports_an_error() {
        let mut sink = GifSink::new(options(0, None)).unwrap();
        let events = drain(sink.render().unwrap());
        assert!(matches!(events.as_slice(), [SinkEvent::Error(_)]));
    }

    #[test]
    fn second_render_is_refused() {
        let mut sink = GifSink::new(options(0, None)).unwrap();
        sink.add_frame(&RgbaImage::new(8, 6), 50);
        let _ = sink.render().unwrap();
        assert!(matches!(sink.render(), Err(ClipError::EncoderError(_))));
    }
}
