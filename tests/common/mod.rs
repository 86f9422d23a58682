//! Shared test doubles: a simulated video element and a recording sink.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use clipgif::{
    ClipError, ConversionFlag, EncoderSink, MediaSource, ProgressCallback, ProgressInfo,
    SeekOutcome, SinkEvent, SinkOptions,
};
use image::{DynamicImage, Rgba, RgbaImage};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// How the simulated video answers a seek.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekBehavior {
    /// The seek settles immediately.
    Instant,
    /// The seek never settles.
    Hang,
    /// The seek reports an error.
    Fail(String),
}

/// An in-memory video element.
///
/// Every displayed frame is a flat image whose first pixel encodes the media
/// position in tenths of a second, see [`position_marker`].
pub struct SimulatedVideo {
    pub duration: f64,
    pub dimensions: Option<(u32, u32)>,
    /// Frames presented per second of media time while playing.
    pub frame_rate: f64,
    pub position: f64,
    pub paused: bool,
    pub ended: bool,
    pub muted: bool,
    pub rate: f64,
    pub seek_behavior: SeekBehavior,
    /// Hang this many seeks before answering with `seek_behavior`.
    pub hang_seeks: usize,
    pub fail_play: bool,
    pub frame_callback: bool,
    /// Stop presenting frames after this many frames of playback.
    pub lose_frames_after: Option<usize>,
    /// Cancel this flag once this many frames have been played.
    pub cancel_after: Option<(usize, ConversionFlag)>,
    pub seeks: Vec<f64>,
    pub plays: usize,
    pub paints: usize,
    pub video_frames: usize,
    played_frames: usize,
    pending_seek: Option<f64>,
    frame: Option<DynamicImage>,
}

impl SimulatedVideo {
    pub fn new(duration: f64) -> Self {
        let mut video = Self {
            duration,
            dimensions: Some((WIDTH, HEIGHT)),
            frame_rate: 30.0,
            position: 0.0,
            paused: true,
            ended: false,
            muted: false,
            rate: 1.0,
            seek_behavior: SeekBehavior::Instant,
            hang_seeks: 0,
            fail_play: false,
            frame_callback: true,
            lose_frames_after: None,
            cancel_after: None,
            seeks: Vec::new(),
            plays: 0,
            paints: 0,
            video_frames: 0,
            played_frames: 0,
            pending_seek: None,
            frame: None,
        };
        video.present();
        video
    }

    fn present(&mut self) {
        let tenths = (self.position * 10.0).round() as u32;
        let pixel = Rgba([(tenths % 256) as u8, (tenths / 256) as u8, 0, 255]);
        self.frame = Some(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            WIDTH, HEIGHT, pixel,
        )));
    }

    fn advance(&mut self) {
        if self.paused || self.ended {
            return;
        }
        self.played_frames += 1;
        self.position += 1.0 / self.frame_rate;
        if self.position >= self.duration {
            self.position = self.duration;
            self.ended = true;
            self.paused = true;
        }

        if let Some((after, flag)) = &self.cancel_after {
            if self.played_frames >= *after {
                flag.cancel();
            }
        }
        match self.lose_frames_after {
            Some(after) if self.played_frames >= after => self.frame = None,
            _ => self.present(),
        }
    }
}

impl MediaSource for SimulatedVideo {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn current_time(&self) -> f64 {
        self.pending_seek.unwrap_or(self.position)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), ClipError> {
        self.seeks.push(seconds);
        self.pending_seek = Some(seconds);
        Ok(())
    }

    async fn seek_settled(&mut self) -> SeekOutcome {
        if self.hang_seeks > 0 {
            self.hang_seeks -= 1;
            return std::future::pending().await;
        }
        match self.seek_behavior.clone() {
            SeekBehavior::Instant => {
                if let Some(target) = self.pending_seek.take() {
                    self.position = target.min(self.duration);
                    self.ended = false;
                    self.present();
                }
                SeekOutcome::Seeked
            }
            SeekBehavior::Hang => std::future::pending().await,
            SeekBehavior::Fail(reason) => {
                self.pending_seek = None;
                SeekOutcome::Failed(reason)
            }
        }
    }

    fn supports_video_frame_callback(&self) -> bool {
        self.frame_callback
    }

    async fn next_video_frame(&mut self) {
        self.video_frames += 1;
        self.advance();
        tokio::task::yield_now().await;
    }

    async fn next_paint(&mut self) {
        self.paints += 1;
        self.advance();
        tokio::task::yield_now().await;
    }

    async fn play(&mut self) -> Result<(), ClipError> {
        if self.fail_play {
            return Err(ClipError::PlaybackError("autoplay refused".to_string()));
        }
        self.plays += 1;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_ended(&self) -> bool {
        self.ended
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn displayed_frame(&self) -> Option<&DynamicImage> {
        self.frame.as_ref()
    }
}

/// The position, in tenths of a second, a captured frame was taken at.
pub fn position_marker(pixels: &RgbaImage) -> u32 {
    let pixel = pixels.get_pixel(0, 0);
    u32::from(pixel[0]) + u32::from(pixel[1]) * 256
}

/// How a [`RecordingSink`] finishes rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    Finish,
    Abort,
    Fail,
}

/// What one sink saw.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub options: SinkOptions,
    pub markers: Vec<u32>,
    pub delays: Vec<u32>,
    pub rendered: bool,
}

/// Shared record of every sink a factory built.
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl SinkLog {
    /// A factory building sinks that end with `outcome`.
    pub fn factory(
        &self,
        outcome: RenderOutcome,
    ) -> impl FnMut(SinkOptions) -> Result<RecordingSink, ClipError> + use<> {
        let records = Arc::clone(&self.records);
        move |options| {
            let index = {
                let mut log = records.lock().unwrap();
                log.push(SinkRecord {
                    options,
                    markers: Vec::new(),
                    delays: Vec::new(),
                    rendered: false,
                });
                log.len() - 1
            };
            Ok(RecordingSink {
                records: Arc::clone(&records),
                index,
                outcome,
            })
        }
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<SinkRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.rendered)
            .collect()
    }
}

/// Records frames and renders a fake GIF header.
pub struct RecordingSink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
    index: usize,
    outcome: RenderOutcome,
}

impl EncoderSink for RecordingSink {
    fn add_frame(&mut self, pixels: &RgbaImage, delay_ms: u32) {
        let mut records = self.records.lock().unwrap();
        let record = &mut records[self.index];
        record.markers.push(position_marker(pixels));
        record.delays.push(delay_ms);
    }

    fn render(&mut self) -> Result<UnboundedReceiver<SinkEvent>, ClipError> {
        self.records.lock().unwrap()[self.index].rendered = true;
        let (sender, receiver) = unbounded_channel();
        let _ = sender.send(SinkEvent::Progress(0.5));
        let _ = sender.send(match self.outcome {
            RenderOutcome::Finish => SinkEvent::Finished(b"GIF89a".to_vec()),
            RenderOutcome::Abort => SinkEvent::Abort,
            RenderOutcome::Fail => SinkEvent::Error("disk full".to_string()),
        });
        Ok(receiver)
    }
}

/// Collects every progress report.
#[derive(Default)]
pub struct ProgressLog {
    pub infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressLog {
    pub fn percents(&self) -> Vec<f32> {
        self.infos.lock().unwrap().iter().map(|info| info.percent).collect()
    }
}

impl ProgressCallback for ProgressLog {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}
