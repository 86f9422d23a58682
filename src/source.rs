//! FFmpeg-backed media source.
//!
//! [`FfmpegMediaSource`] emulates a media element over an FFmpeg demuxer and
//! decoder so the scheduler can drive a video file the same way it would
//! drive a player:
//!
//! - setting the current time starts a seek, which completes inside
//!   [`seek_settled`](MediaSource::seek_settled) by seeking the container to
//!   the preceding keyframe and decoding forward to the target;
//! - while playing, every [`next_video_frame`](MediaSource::next_video_frame)
//!   decodes and presents the next frame. Playback is as fast as decoding
//!   unless realtime pacing is enabled, in which case frames are presented on
//!   the wall clock scaled by the playback rate;
//! - mute has no effect on decoding (there is no audio output).
//!
//! Every signal yields to the runtime before resolving, so other tasks on the
//! same thread (a Ctrl-C handler, progress rendering) keep running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::{DynamicImage, RgbaImage};
use tokio::time::Instant;

use crate::error::ClipError;
use crate::media::{MediaSource, SeekOutcome};
use crate::utilities::{
    container_duration_seconds, frame_to_buffer, pts_to_seconds, rational_to_fps,
    seconds_to_seek_timestamp,
};

/// Set FFmpeg's own console verbosity: errors only, or informational output
/// when `verbose` is set. Does not affect the `log` crate.
pub fn set_ffmpeg_verbose(verbose: bool) {
    ffmpeg_next::util::log::set_level(if verbose { Level::Info } else { Level::Error });
}

/// A video file exposed through the [`MediaSource`] contract.
pub struct FfmpegMediaSource {
    path: PathBuf,
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    codec: String,
    duration: f64,
    frame_rate: f64,
    width: u32,
    height: u32,
    decoded: VideoFrame,
    scaled: VideoFrame,
    displayed: Option<DynamicImage>,
    position: f64,
    pending_seek: Option<f64>,
    frame_pending: bool,
    eof_sent: bool,
    ended: bool,
    paused: bool,
    muted: bool,
    rate: f64,
    realtime: bool,
    clock: Option<(Instant, f64)>,
}

impl FfmpegMediaSource {
    /// Open a video file and decode its first frame.
    ///
    /// # Errors
    ///
    /// - [`ClipError::FileOpen`] if FFmpeg cannot open the file.
    /// - [`ClipError::NoVideoStream`] if it has no video stream.
    /// - [`ClipError::FfmpegError`] if no decoder or scaler can be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ClipError> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| ClipError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;
        let input = ffmpeg_next::format::input(&path).map_err(|error| ClipError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ClipError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let mut frame_rate = rational_to_fps(stream.avg_frame_rate());
        if frame_rate == 0.0 {
            frame_rate = rational_to_fps(stream.rate());
        }
        let mut duration = container_duration_seconds(input.duration());
        if duration == 0.0 && stream.duration() > 0 {
            duration = pts_to_seconds(stream.duration(), time_base);
        }

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGBA,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        log::debug!(
            "Opened {} ({codec}, {width}x{height}, {frame_rate:.3} fps, {duration:.3}s)",
            path.display()
        );

        let mut source = Self {
            path,
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            codec,
            duration,
            frame_rate,
            width,
            height,
            decoded: VideoFrame::empty(),
            scaled: VideoFrame::empty(),
            displayed: None,
            position: 0.0,
            pending_seek: None,
            frame_pending: false,
            eof_sent: false,
            ended: false,
            paused: true,
            muted: false,
            rate: 1.0,
            realtime: false,
            clock: None,
        };
        if !source.decode_next()? {
            return Err(ClipError::VideoDecodeError(
                "Video stream contains no decodable frame".to_string(),
            ));
        }
        source.frame_pending = false;
        Ok(source)
    }

    /// Present frames on the wall clock (scaled by the playback rate) instead
    /// of as fast as they decode.
    #[must_use]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the video codec.
    pub fn codec(&self) -> &str {
        &self.codec
    }

    /// Average frame rate of the video stream, `0.0` if unknown.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Receive or decode the next frame and put it on display.
    ///
    /// Returns `false` once the stream is exhausted.
    fn decode_next(&mut self) -> Result<bool, ClipError> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                self.present_decoded()?;
                return Ok(true);
            }

            if self.eof_sent {
                self.ended = true;
                return Ok(false);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => log::debug!("Skipping unreadable packet: {error}"),
            }
        }
    }

    fn present_decoded(&mut self) -> Result<(), ClipError> {
        self.scaler.run(&self.decoded, &mut self.scaled)?;
        let buffer = frame_to_buffer(&self.scaled, self.width, self.height, 4);
        let image = RgbaImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            ClipError::VideoDecodeError(
                "Failed to construct RGBA image from decoded frame data".to_string(),
            )
        })?;

        if let Some(pts) = self.decoded.timestamp().or_else(|| self.decoded.pts()) {
            self.position = pts_to_seconds(pts, self.time_base);
        } else if self.frame_rate > 0.0 {
            self.position += 1.0 / self.frame_rate;
        }
        self.displayed = Some(DynamicImage::ImageRgba8(image));
        self.frame_pending = true;
        Ok(())
    }

    /// Seek the container to the keyframe before `target` and decode forward
    /// until the frame covering `target` is on display.
    fn perform_seek(&mut self, target: f64) -> Result<(), ClipError> {
        let timestamp = seconds_to_seek_timestamp(target);
        self.input.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.eof_sent = false;
        self.ended = false;

        let half_frame = if self.frame_rate > 0.0 {
            0.5 / self.frame_rate
        } else {
            0.0
        };
        while self.decode_next()? {
            if self.position + half_frame >= target {
                break;
            }
        }
        if self.ended {
            log::debug!("Seek to {target:.3}s ran past the last frame");
            self.position = target.min(self.duration);
        }
        self.frame_pending = true;
        self.clock = None;
        Ok(())
    }

    async fn pace(&mut self) {
        if !self.realtime {
            return;
        }
        let rate = self.rate.max(f64::MIN_POSITIVE);
        let (anchor, origin) = *self
            .clock
            .get_or_insert_with(|| (Instant::now(), self.position));
        let offset = ((self.position - origin) / rate).max(0.0);
        tokio::time::sleep_until(anchor + Duration::from_secs_f64(offset)).await;
    }
}

impl MediaSource for FfmpegMediaSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn video_dimensions(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0 && self.displayed.is_some())
            .then_some((self.width, self.height))
    }

    fn current_time(&self) -> f64 {
        self.pending_seek.unwrap_or(self.position)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), ClipError> {
        if !seconds.is_finite() {
            return Err(ClipError::SeekError {
                time: seconds,
                reason: "target is not a finite position".to_string(),
            });
        }
        let upper = if self.duration > 0.0 {
            self.duration
        } else {
            f64::MAX
        };
        self.pending_seek = Some(seconds.clamp(0.0, upper));
        Ok(())
    }

    async fn seek_settled(&mut self) -> SeekOutcome {
        let Some(target) = self.pending_seek.take() else {
            return SeekOutcome::Seeked;
        };
        let outcome = match self.perform_seek(target) {
            Ok(()) => {
                log::debug!("Seeked to {target:.3}s, showing {:.3}s", self.position);
                SeekOutcome::Seeked
            }
            Err(error) => SeekOutcome::Failed(error.to_string()),
        };
        tokio::task::yield_now().await;
        outcome
    }

    fn supports_video_frame_callback(&self) -> bool {
        true
    }

    async fn next_video_frame(&mut self) {
        if self.frame_pending {
            self.frame_pending = false;
        } else if !self.paused && !self.ended {
            match self.decode_next() {
                Ok(true) => {
                    self.frame_pending = false;
                    self.pace().await;
                }
                Ok(false) => log::debug!("Playback reached the end of {}", self.path.display()),
                Err(error) => {
                    log::warn!("Decoding stopped at {:.3}s: {error}", self.position);
                    self.ended = true;
                }
            }
        }
        tokio::task::yield_now().await;
    }

    async fn next_paint(&mut self) {
        tokio::task::yield_now().await;
    }

    async fn play(&mut self) -> Result<(), ClipError> {
        if self.ended {
            return Err(ClipError::PlaybackError(
                "cannot play past the end of the stream".to_string(),
            ));
        }
        if let Some(target) = self.pending_seek.take() {
            self.perform_seek(target)?;
        }
        self.paused = false;
        self.clock = None;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
        self.clock = None;
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
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
            self.clock = None;
        }
    }

    fn displayed_frame(&self) -> Option<&DynamicImage> {
        self.displayed.as_ref()
    }
}
