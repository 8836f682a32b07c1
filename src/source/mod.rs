//! Media source acquisition
//!
//! Sources are acquired through a [`SourceProvider`]. Every operation returns
//! a boxed future so the engine can run it on a spawned task and keep
//! handling input while the platform (or the user) answers.

mod synthetic;

#[cfg(feature = "screen-capture")]
mod screen;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub use synthetic::SyntheticProvider;

#[cfg(feature = "screen-capture")]
pub use screen::ScreenProvider;

/// Errors raised while acquiring a source or enumerating devices
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[cfg_attr(not(feature = "screen-capture"), allow(dead_code))]
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no matching video device{}", .0.as_ref().map(|id| format!(" ({})", id)).unwrap_or_default())]
    NoDevice(Option<DeviceId>),

    #[cfg_attr(not(feature = "screen-capture"), allow(dead_code))]
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("source ended before it could be shown")]
    Stopped,
}

/// Platform identifier of a video input device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A video input device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub label: String,
}

/// A single live video track
pub trait VideoTrack: Send + Sync + fmt::Debug {
    /// Human-readable label (usually the device name)
    fn label(&self) -> &str;

    /// Latest frame at the track's natural size.
    /// Returns None before the first frame and after the track is stopped.
    fn current_frame(&self) -> Option<RgbaImage>;

    /// Natural frame size, if known
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Stop the track. Further calls are no-ops.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Handle to zero or more live video tracks
#[derive(Debug, Clone)]
pub struct MediaSource {
    label: String,
    tracks: Vec<Arc<dyn VideoTrack>>,
}

impl MediaSource {
    pub fn new(label: impl Into<String>, tracks: Vec<Arc<dyn VideoTrack>>) -> Self {
        Self {
            label: label.into(),
            tracks,
        }
    }

    pub fn first_video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.tracks.first().cloned()
    }

    /// Label of the first video track, falling back to the source label
    pub fn track_label(&self) -> &str {
        self.tracks
            .first()
            .map(|track| track.label())
            .unwrap_or(&self.label)
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|track| track.is_live())
    }
}

/// Future returned by every provider operation
pub type AcquireFuture<T> = BoxFuture<'static, Result<T, AcquireError>>;

/// Collaborator that yields media sources
pub trait SourceProvider: Send + Sync {
    /// Acquire a screen share at the configured target size and frame rate
    fn acquire_screen(&self) -> AcquireFuture<MediaSource>;

    /// Acquire a camera: the system default when `device` is None
    fn acquire_camera(&self, device: Option<DeviceId>) -> AcquireFuture<MediaSource>;

    /// List video input devices in platform order
    fn enumerate_video_inputs(&self) -> AcquireFuture<Vec<DeviceInfo>>;
}

/// Create the source provider for the current build
pub fn create_source_provider(config: &Config) -> Arc<dyn SourceProvider> {
    #[cfg(feature = "screen-capture")]
    let provider: Arc<dyn SourceProvider> = {
        tracing::info!("Using display capture for screen shares");
        Arc::new(ScreenProvider::new(config))
    };

    #[cfg(not(feature = "screen-capture"))]
    let provider: Arc<dyn SourceProvider> = {
        tracing::info!("Using synthetic test-pattern sources");
        Arc::new(SyntheticProvider::new(config))
    };

    provider
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic tracks and providers for unit tests

    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A track that returns whatever frame it was last given
    #[derive(Debug)]
    pub struct StaticTrack {
        label: String,
        frame: Mutex<Option<RgbaImage>>,
        stopped: AtomicBool,
        stop_calls: AtomicUsize,
    }

    impl StaticTrack {
        pub fn new(label: &str, frame: RgbaImage) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                frame: Mutex::new(Some(frame)),
                stopped: AtomicBool::new(false),
                stop_calls: AtomicUsize::new(0),
            })
        }

        pub fn empty(label: &str) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                frame: Mutex::new(None),
                stopped: AtomicBool::new(false),
                stop_calls: AtomicUsize::new(0),
            })
        }

        pub fn set_frame(&self, frame: Option<RgbaImage>) {
            *self.frame.lock().unwrap() = frame;
        }

        pub fn stop_calls(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }
    }

    impl VideoTrack for StaticTrack {
        fn label(&self) -> &str {
            &self.label
        }

        fn current_frame(&self) -> Option<RgbaImage> {
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }
            self.frame.lock().unwrap().clone()
        }

        fn dimensions(&self) -> Option<(u32, u32)> {
            self.frame.lock().unwrap().as_ref().map(|f| f.dimensions())
        }

        fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst)
        }
    }

    pub fn source_with_label(label: &str) -> (MediaSource, Arc<StaticTrack>) {
        let track = StaticTrack::new(label, RgbaImage::new(16, 9));
        let source = MediaSource::new(label, vec![track.clone() as Arc<dyn VideoTrack>]);
        (source, track)
    }

    /// Provider with a fixed device list that records every acquisition
    #[derive(Debug, Default)]
    pub struct FakeProvider {
        pub cameras: Vec<DeviceInfo>,
        pub fail_screen: bool,
        pub acquired: Arc<Mutex<Vec<Arc<StaticTrack>>>>,
        pub camera_requests: Arc<Mutex<Vec<Option<DeviceId>>>>,
    }

    impl FakeProvider {
        pub fn with_cameras(labels: &[&str]) -> Self {
            Self {
                cameras: labels
                    .iter()
                    .enumerate()
                    .map(|(i, label)| DeviceInfo {
                        id: DeviceId(format!("cam-{}", i)),
                        label: label.to_string(),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub fn acquired(&self) -> Vec<Arc<StaticTrack>> {
            self.acquired.lock().unwrap().clone()
        }

        fn record(&self, label: &str) -> MediaSource {
            let (source, track) = source_with_label(label);
            self.acquired.lock().unwrap().push(track);
            source
        }
    }

    impl SourceProvider for FakeProvider {
        fn acquire_screen(&self) -> AcquireFuture<MediaSource> {
            let result = if self.fail_screen {
                Err(AcquireError::PermissionDenied("screen".into()))
            } else {
                Ok(self.record("Entire screen"))
            };
            async move { result }.boxed()
        }

        fn acquire_camera(&self, device: Option<DeviceId>) -> AcquireFuture<MediaSource> {
            self.camera_requests.lock().unwrap().push(device.clone());
            let found = match &device {
                None => self.cameras.first(),
                Some(id) => self.cameras.iter().find(|cam| &cam.id == id),
            };
            let result = match found {
                Some(cam) => Ok(self.record(&cam.label)),
                None => Err(AcquireError::NoDevice(device)),
            };
            async move { result }.boxed()
        }

        fn enumerate_video_inputs(&self) -> AcquireFuture<Vec<DeviceInfo>> {
            let cameras = self.cameras.clone();
            async move { Ok(cameras) }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_track_label_prefers_first_track() {
        let (source, _) = source_with_label("FaceTime HD Camera");
        assert_eq!(source.track_label(), "FaceTime HD Camera");

        let bare = MediaSource::new("display", Vec::new());
        assert_eq!(bare.track_label(), "display");
        assert!(!bare.is_live());
    }

    #[test]
    fn test_stop_stops_every_track() {
        let a = StaticTrack::new("a", RgbaImage::new(1, 1));
        let b = StaticTrack::new("b", RgbaImage::new(1, 1));
        let tracks: Vec<Arc<dyn VideoTrack>> = vec![a.clone(), b.clone()];
        let source = MediaSource::new("pair", tracks);
        assert!(source.is_live());
        source.stop();
        assert!(!a.is_live() && !b.is_live());
        assert!(a.current_frame().is_none());
    }

    #[tokio::test]
    async fn test_provider_for_build_offers_configured_cameras() {
        let mut config = Config::default();
        config.sources.cameras = vec!["Desk Camera".into(), "Room Camera".into()];
        let provider = create_source_provider(&config);
        let cameras = provider.enumerate_video_inputs().await.unwrap();
        let labels: Vec<_> = cameras.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Desk Camera", "Room Camera"]);
    }

    #[test]
    fn test_no_device_error_message() {
        let err = AcquireError::NoDevice(Some(DeviceId("cam-7".into())));
        assert_eq!(err.to_string(), "no matching video device (cam-7)");
        assert_eq!(
            AcquireError::NoDevice(None).to_string(),
            "no matching video device"
        );
    }
}
