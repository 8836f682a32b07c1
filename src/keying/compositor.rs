//! Fixed-rate compositing loop for keyed items
//!
//! Each keyed item owns a [`KeyerHandle`]. The handle's task snapshots the
//! item's video track into a capture surface, keys it, and publishes both on a
//! watch channel. Dropping or stopping the handle aborts the task, so no tick
//! can run once the owning item is gone.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::keyer::key_near_white;
use crate::source::VideoTrack;

/// One published compositing result
#[derive(Debug, Clone)]
pub struct KeyedFrame {
    /// Tick sequence number, starting at 1
    pub sequence: u64,
    /// Intermediate capture surface (the unkeyed snapshot)
    pub capture: Arc<RgbaImage>,
    /// Keyed canvas
    pub keyed: Arc<RgbaImage>,
}

/// Which of the two keyed-mode surfaces is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyedSurface {
    /// The keyed canvas, updated every tick
    #[default]
    Live,
    /// The capture buffer behind the canvas
    Buffer,
}

impl KeyedSurface {
    pub fn swapped(self) -> Self {
        match self {
            KeyedSurface::Live => KeyedSurface::Buffer,
            KeyedSurface::Buffer => KeyedSurface::Live,
        }
    }
}

/// Owned handle to a running compositing loop
#[derive(Debug)]
pub struct KeyerHandle {
    task: JoinHandle<()>,
    frames: watch::Receiver<Option<KeyedFrame>>,
}

impl KeyerHandle {
    /// Start compositing `track` at `frame_rate` frames per second.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(track: Arc<dyn VideoTrack>, frame_rate: u32, threshold: u8) -> Self {
        let (tx, frames) = watch::channel(None);
        let period = frame_period(frame_rate);
        debug!(
            "Starting compositing loop for '{}' every {:?}",
            track.label(),
            period
        );
        let task = tokio::spawn(run_loop(track, period, threshold, tx));
        Self { task, frames }
    }

    /// Latest published frame, if any tick has produced one yet
    pub fn latest(&self) -> Option<KeyedFrame> {
        self.frames.borrow().clone()
    }

    /// Subscribe to published frames. The channel closes when the loop stops.
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<Option<KeyedFrame>> {
        self.frames.clone()
    }

    /// Stop the loop. Safe to call more than once.
    pub fn stop(&self) {
        self.task.abort();
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for KeyerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn frame_period(frame_rate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(frame_rate.clamp(1, 1000)))
}

async fn run_loop(
    track: Arc<dyn VideoTrack>,
    period: Duration,
    threshold: u8,
    tx: watch::Sender<Option<KeyedFrame>>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence = 0u64;

    loop {
        interval.tick().await;

        // Snapshot and key off the async worker; dimensions are re-measured
        // from whatever frame the track hands back this tick.
        let tick_track = track.clone();
        let result = tokio::task::spawn_blocking(move || {
            let capture = tick_track.current_frame()?;
            if capture.width() == 0 || capture.height() == 0 {
                return None;
            }
            let keyed = key_near_white(&capture, threshold);
            Some((capture, keyed))
        })
        .await;

        let (capture, keyed) = match result {
            Ok(Some(frames)) => frames,
            Ok(None) => {
                trace!("No frame available from '{}' this tick", track.label());
                continue;
            }
            Err(e) => {
                warn!("Compositing tick for '{}' failed: {}", track.label(), e);
                continue;
            }
        };

        sequence += 1;
        let frame = KeyedFrame {
            sequence,
            capture: Arc::new(capture),
            keyed: Arc::new(keyed),
        };
        if tx.send(Some(frame)).is_err() {
            // Every receiver is gone, including the handle's own.
            break;
        }
    }
}
