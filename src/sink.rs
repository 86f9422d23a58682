//! Encoder sink contract and adapter.
//!
//! The encoder that turns frames into GIF bytes is opaque to the scheduler.
//! It is built per attempt by a [`SinkFactory`], receives copies of frames
//! through [`EncoderSink::add_frame`], and is rendered at most once; the
//! render call hands back a channel of [`SinkEvent`]s instead of callback
//! registrations.
//!
//! [`EncoderAdapter`] wraps a sink for the orchestrator: it forwards
//! [`FrameSample`]s, enforces the single render, and folds the sink's
//! `[0, 1]` progress into the `[75, 100]` band of overall progress.

use image::RgbaImage;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::ClipError;
use crate::plan::ExtractionPlan;
use crate::progress::ProgressReporter;
use crate::session::FrameSample;

/// Background workers used when a runtime is available.
pub const DEFAULT_WORKERS: usize = 2;

/// Settings an encoder sink is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    /// Background workers to encode on. `0` means encode synchronously on
    /// the calling task.
    pub workers: usize,
    /// Quantizer quality, `1` (best) to `30` (fastest).
    pub quality: u8,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Repeat count. `None` loops forever.
    pub repeat: Option<u16>,
}

impl SinkOptions {
    /// Options for encoding `plan` with `workers` background workers.
    pub fn for_plan(plan: &ExtractionPlan, workers: usize) -> Self {
        Self {
            workers,
            quality: plan.quality,
            width: plan.target_width,
            height: plan.target_height,
            repeat: if plan.looping { None } else { Some(1) },
        }
    }
}

/// Signals emitted by a sink while rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Rendering progress in `[0, 1]`.
    Progress(f32),
    /// Rendering finished with the encoded artifact.
    Finished(Vec<u8>),
    /// Rendering was aborted.
    Abort,
    /// Rendering failed.
    Error(String),
}

/// An external encoder consuming a frame sequence.
pub trait EncoderSink {
    /// Queue a frame. The sink copies `pixels`; the buffer is reused by the
    /// caller for the next frame.
    fn add_frame(&mut self, pixels: &RgbaImage, delay_ms: u32);

    /// Start rendering the queued frames.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering cannot be started at all.
    fn render(&mut self) -> Result<UnboundedReceiver<SinkEvent>, ClipError>;
}

/// Builds a fresh sink for every extraction attempt.
pub trait SinkFactory {
    /// The sink type built.
    type Sink: EncoderSink;

    /// Build a sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be constructed.
    fn create(&mut self, options: SinkOptions) -> Result<Self::Sink, ClipError>;
}

impl<F, K> SinkFactory for F
where
    F: FnMut(SinkOptions) -> Result<K, ClipError>,
    K: EncoderSink,
{
    type Sink = K;

    fn create(&mut self, options: SinkOptions) -> Result<K, ClipError> {
        self(options)
    }
}

/// How many background workers the sink gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// [`DEFAULT_WORKERS`] when a Tokio runtime is available, otherwise
    /// synchronous encoding.
    #[default]
    Auto,
    /// A fixed number of workers; `0` is the same as [`WorkerMode::Inline`].
    Threads(usize),
    /// Always encode synchronously.
    Inline,
}

impl WorkerMode {
    /// Resolve to a worker count for the current execution context.
    pub fn resolve(self) -> usize {
        match self {
            WorkerMode::Auto => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    DEFAULT_WORKERS
                } else {
                    log::debug!("No background runtime available, encoding inline");
                    0
                }
            }
            WorkerMode::Threads(count) => count,
            WorkerMode::Inline => 0,
        }
    }
}

/// Forwards frames to a sink and renders it once.
pub struct EncoderAdapter<K: EncoderSink> {
    sink: K,
    frames: u64,
}

impl<K: EncoderSink> EncoderAdapter<K> {
    /// Wrap `sink`.
    pub fn new(sink: K) -> Self {
        Self { sink, frames: 0 }
    }

    /// Queue `sample` on the sink (the sink copies the pixels).
    pub fn push(&mut self, sample: &FrameSample<'_>) {
        self.sink.add_frame(sample.pixels, sample.delay_ms);
        self.frames += 1;
    }

    /// Frames queued so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Render the sink and wait for its terminal event.
    ///
    /// Consumes the adapter, so a sink is never rendered twice.
    ///
    /// # Errors
    ///
    /// - [`ClipError::EncoderAbort`] if the sink aborts, or its event
    ///   channel closes without a result.
    /// - [`ClipError::EncoderError`] if the sink reports an error.
    pub async fn render(self) -> Result<Vec<u8>, ClipError> {
        self.render_with(|_| {}).await
    }

    pub(crate) async fn render_reporting(
        self,
        reporter: &ProgressReporter,
    ) -> Result<Vec<u8>, ClipError> {
        reporter.encoding_started();
        self.render_with(|fraction| reporter.encoding(fraction)).await
    }

    async fn render_with(
        mut self,
        mut on_progress: impl FnMut(f32),
    ) -> Result<Vec<u8>, ClipError> {
        log::debug!("Rendering {} frames", self.frames);
        let mut events = self.sink.render()?;

        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Progress(fraction) => on_progress(fraction),
                SinkEvent::Finished(bytes) => {
                    log::debug!("Encoder finished with {} bytes", bytes.len());
                    return Ok(bytes);
                }
                SinkEvent::Abort => return Err(ClipError::EncoderAbort),
                SinkEvent::Error(reason) => return Err(ClipError::EncoderError(reason)),
            }
        }

        Err(ClipError::EncoderAbort)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::progress::{ConversionPhase, ProgressCallback, ProgressInfo};

    struct ScriptedSink {
        events: Vec<SinkEvent>,
        frames: Vec<RgbaImage>,
    }

    impl EncoderSink for ScriptedSink {
        fn add_frame(&mut self, pixels: &RgbaImage, _delay_ms: u32) {
            self.frames.push(pixels.clone());
        }

        fn render(&mut self) -> Result<UnboundedReceiver<SinkEvent>, ClipError> {
            let (sender, receiver) = unbounded_channel();
            for event in self.events.drain(..) {
                let _ = sender.send(event);
            }
            Ok(receiver)
        }
    }

    struct Recorder(Mutex<Vec<ProgressInfo>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push(info.clone());
        }
    }

    fn adapter(events: Vec<SinkEvent>) -> EncoderAdapter<ScriptedSink> {
        EncoderAdapter::new(ScriptedSink {
            events,
            frames: Vec::new(),
        })
    }

    #[tokio::test]
    async fn half_rendered_reports_eighty_seven_and_a_half() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let reporter = ProgressReporter::new(recorder.clone());
        let bytes = adapter(vec![
            SinkEvent::Progress(0.5),
            SinkEvent::Finished(vec![1, 2, 3]),
        ])
        .render_reporting(&reporter)
        .await
        .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let infos = recorder.0.lock().unwrap();
        let encoding: Vec<f32> = infos
            .iter()
            .filter(|info| info.phase == ConversionPhase::Encoding)
            .map(|info| info.percent)
            .collect();
        assert_eq!(encoding, vec![75.0, 87.5]);
    }

    #[tokio::test]
    async fn abort_and_error_are_distinct() {
        let aborted = adapter(vec![SinkEvent::Abort]).render().await;
        assert!(matches!(aborted, Err(ClipError::EncoderAbort)));

        let failed = adapter(vec![SinkEvent::Error("boom".to_string())]).render().await;
        assert!(matches!(failed, Err(ClipError::EncoderError(reason)) if reason == "boom"));
    }

    #[tokio::test]
    async fn closed_channel_without_result_is_an_abort() {
        let result = adapter(vec![SinkEvent::Progress(0.2)]).render().await;
        assert!(matches!(result, Err(ClipError::EncoderAbort)));
    }

    #[tokio::test]
    async fn auto_workers_inside_runtime() {
        assert_eq!(WorkerMode::Auto.resolve(), DEFAULT_WORKERS);
        assert_eq!(WorkerMode::Inline.resolve(), 0);
        assert_eq!(WorkerMode::Threads(3).resolve(), 3);
    }

    #[test]
    fn auto_workers_without_runtime() {
        assert_eq!(WorkerMode::Auto.resolve(), 0);
    }
}
