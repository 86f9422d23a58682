//! Scoped save/restore of media source attributes.
//!
//! Extraction mutes the source, pauses it and changes its playback rate.
//! [`MediaStateGuard`] records the attributes first and puts `muted` and
//! `playback_rate` back exactly once, either through
//! [`release`](MediaStateGuard::release) or, on any other exit path
//! (an error returned with `?`, a cancelled conversion, a dropped future),
//! through [`Drop`].

use std::ops::{Deref, DerefMut};

use crate::media::MediaSource;
use crate::plan::SPEED_RANGE;

/// Source attributes captured before a conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSnapshot {
    /// Whether audio was muted.
    pub muted: bool,
    /// Playback rate multiplier.
    pub playback_rate: f64,
    /// Whether playback was paused.
    pub paused: bool,
}

impl MediaSnapshot {
    /// Read the attributes of `source`.
    pub fn capture<S: MediaSource>(source: &S) -> Self {
        Self {
            muted: source.is_muted(),
            playback_rate: source.playback_rate(),
            paused: source.is_paused(),
        }
    }
}

/// Holds a media source in capture mode (paused, muted, fixed rate).
///
/// Dereferences to the source so strategies can drive it while the guard is
/// alive.
pub struct MediaStateGuard<'a, S: MediaSource> {
    source: &'a mut S,
    snapshot: MediaSnapshot,
    restored: bool,
}

impl<'a, S: MediaSource> MediaStateGuard<'a, S> {
    /// Snapshot `source`, pause it, mute it and set its rate to `speed`
    /// clamped into `[1, 8]`.
    pub fn acquire(source: &'a mut S, speed: f64) -> Self {
        let snapshot = MediaSnapshot::capture(source);
        source.pause();
        source.set_muted(true);
        let rate = if speed.is_finite() {
            speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
        } else {
            SPEED_RANGE.0
        };
        source.set_playback_rate(rate);
        log::debug!(
            "Captured media state (muted={}, rate={}, paused={}), extracting at {rate}x",
            snapshot.muted,
            snapshot.playback_rate,
            snapshot.paused,
        );

        Self {
            source,
            snapshot,
            restored: false,
        }
    }

    /// The attributes recorded at acquisition.
    pub fn snapshot(&self) -> MediaSnapshot {
        self.snapshot
    }

    /// Restore the recorded attributes after a successful conversion.
    ///
    /// When `resume` is set and the source was playing before the
    /// conversion, playback is resumed. A refused resume is only logged.
    pub async fn release(mut self, resume: bool) {
        self.restore();
        if resume && !self.snapshot.paused {
            if let Err(error) = self.source.play().await {
                log::debug!("Could not resume playback after conversion: {error}");
            }
        }
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.source.set_muted(self.snapshot.muted);
        self.source.set_playback_rate(self.snapshot.playback_rate);
        self.restored = true;
        log::debug!(
            "Restored media state (muted={}, rate={})",
            self.snapshot.muted,
            self.snapshot.playback_rate
        );
    }
}

impl<S: MediaSource> Deref for MediaStateGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.source
    }
}

impl<S: MediaSource> DerefMut for MediaStateGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.source
    }
}

impl<S: MediaSource> Drop for MediaStateGuard<'_, S> {
    fn drop(&mut self) {
        self.restore();
    }
}
