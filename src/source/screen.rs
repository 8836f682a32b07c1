//! Display capture through the `screenshots` crate
//!
//! Screen shares capture the primary display on every frame request and
//! downscale to the configured target size. Cameras are still synthetic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::FutureExt;
use image::imageops::FilterType;
use image::RgbaImage;
use screenshots::Screen;
use tracing::{debug, info, warn};

use super::{
    AcquireError, AcquireFuture, DeviceId, DeviceInfo, MediaSource, SourceProvider,
    SyntheticProvider, VideoTrack,
};
use crate::config::Config;

/// Calculate output dimensions with an aspect-preserving downscale
///
/// Sources already inside the target box keep their native size.
pub fn fit_within(
    base_width: u32,
    base_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if base_width == 0 || base_height == 0 {
        return (base_width, base_height);
    }
    if (max_width == 0 || base_width <= max_width) && (max_height == 0 || base_height <= max_height)
    {
        return (base_width, base_height);
    }

    let scale_w = if max_width == 0 {
        f64::MAX
    } else {
        f64::from(max_width) / f64::from(base_width)
    };
    let scale_h = if max_height == 0 {
        f64::MAX
    } else {
        f64::from(max_height) / f64::from(base_height)
    };
    let scale = scale_w.min(scale_h);

    let w = (f64::from(base_width) * scale).round().max(1.0) as u32;
    let h = (f64::from(base_height) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Live capture of one display
#[derive(Debug)]
pub struct ScreenTrack {
    label: String,
    screen: Screen,
    target: (u32, u32),
    min_interval: Duration,
    last: Mutex<Option<(Instant, RgbaImage)>>,
    stopped: AtomicBool,
}

impl ScreenTrack {
    fn capture(&self) -> Option<RgbaImage> {
        let captured = match self.screen.capture() {
            Ok(img) => img,
            Err(e) => {
                warn!("Display capture for '{}' failed: {}", self.label, e);
                return None;
            }
        };

        // screenshots links its own image version; move the raw buffer across.
        let (width, height) = (captured.width(), captured.height());
        let frame = RgbaImage::from_raw(width, height, captured.into_raw())?;

        let (w, h) = fit_within(width, height, self.target.0, self.target.1);
        if (w, h) == (width, height) {
            Some(frame)
        } else {
            Some(image::imageops::resize(&frame, w, h, FilterType::Triangle))
        }
    }
}

impl VideoTrack for ScreenTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn current_frame(&self) -> Option<RgbaImage> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }

        // Hold the lock across capture so concurrent readers share one grab
        let mut last = self.last.lock().ok()?;
        if let Some((at, frame)) = last.as_ref() {
            if at.elapsed() < self.min_interval {
                return Some(frame.clone());
            }
        }

        let frame = self.capture()?;
        *last = Some((Instant::now(), frame.clone()));
        Some(frame)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        let info = &self.screen.display_info;
        let width = (f64::from(info.width) * f64::from(info.scale_factor)).round() as u32;
        let height = (f64::from(info.height) * f64::from(info.scale_factor)).round() as u32;
        Some(fit_within(width, height, self.target.0, self.target.1))
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            if let Ok(mut last) = self.last.lock() {
                *last = None;
            }
            debug!("Stopped display capture '{}'", self.label);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

/// Real display capture for screen shares, synthetic cameras
#[derive(Debug, Clone)]
pub struct ScreenProvider {
    target: (u32, u32),
    frame_rate: u32,
    cameras: SyntheticProvider,
}

impl ScreenProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            target: (config.screen.width, config.screen.height),
            frame_rate: config.screen.frame_rate,
            cameras: SyntheticProvider::new(config),
        }
    }
}

impl SourceProvider for ScreenProvider {
    fn acquire_screen(&self) -> AcquireFuture<MediaSource> {
        let target = self.target;
        let min_interval = Duration::from_millis(1000 / u64::from(self.frame_rate.clamp(1, 1000)));
        async move {
            let screens = tokio::task::spawn_blocking(Screen::all)
                .await
                .map_err(|e| AcquireError::Capture(e.to_string()))?
                .map_err(|e| AcquireError::PermissionDenied(e.to_string()))?;

            let screen = screens
                .iter()
                .find(|s| s.display_info.is_primary)
                .or_else(|| screens.first())
                .cloned()
                .ok_or(AcquireError::NoDevice(None))?;

            let label = format!("Display {}", screen.display_info.id);
            info!(
                "Acquired display capture '{}' (target {}x{})",
                label, target.0, target.1
            );

            let track = ScreenTrack {
                label: label.clone(),
                screen,
                target,
                min_interval,
                last: Mutex::new(None),
                stopped: AtomicBool::new(false),
            };
            Ok(MediaSource::new(
                label,
                vec![Arc::new(track) as Arc<dyn VideoTrack>],
            ))
        }
        .boxed()
    }

    fn acquire_camera(&self, device: Option<DeviceId>) -> AcquireFuture<MediaSource> {
        self.cameras.acquire_camera(device)
    }

    fn enumerate_video_inputs(&self) -> AcquireFuture<Vec<DeviceInfo>> {
        self.cameras.enumerate_video_inputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_keeps_small_sources() {
        assert_eq!(fit_within(1280, 720, 1512, 1024), (1280, 720));
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        assert_eq!(fit_within(3024, 1964, 1512, 1024), (1512, 982));
        assert_eq!(fit_within(1000, 4000, 1512, 1024), (256, 1024));
    }

    #[test]
    fn test_fit_within_zero_means_unbounded() {
        assert_eq!(fit_within(4000, 3000, 0, 1500), (2000, 1500));
        assert_eq!(fit_within(4000, 3000, 0, 0), (4000, 3000));
    }
}
