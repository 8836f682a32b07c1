//! Synthetic test-pattern sources
//!
//! Stand-ins for screen shares and cameras when no capture backend is
//! compiled in. Frames sit on a near-white background so keying is visible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use super::{
    AcquireError, AcquireFuture, DeviceId, DeviceInfo, MediaSource, SourceProvider, VideoTrack,
};
use crate::config::Config;

const BACKGROUND: Rgba<u8> = Rgba([250, 250, 250, 255]);

/// Which picture a synthetic track draws
#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// A window-like panel drifting across a white desktop
    Screen,
    /// A coloured subject bobbing in front of a white wall
    Camera { hue: usize },
}

const SUBJECT_COLORS: [[u8; 3]; 4] = [[200, 40, 40], [40, 160, 60], [40, 80, 200], [220, 150, 20]];

/// Animated test-pattern track
#[derive(Debug)]
pub struct SyntheticTrack {
    label: String,
    width: u32,
    height: u32,
    pattern: Pattern,
    started: Instant,
    stopped: AtomicBool,
}

impl SyntheticTrack {
    fn new(label: &str, width: u32, height: u32, pattern: Pattern) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            pattern,
            started: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }

    fn render(&self, elapsed_ms: u128) -> RgbaImage {
        let (w, h) = (self.width, self.height);
        let mut frame = RgbaImage::from_pixel(w, h, BACKGROUND);
        match self.pattern {
            Pattern::Screen => {
                let panel_w = w / 3;
                let panel_h = h / 2;
                let travel = u128::from(w.saturating_sub(panel_w).max(1));
                let x0 = ((elapsed_ms / 20) % travel) as u32;
                let y0 = h / 4;
                fill_rect(&mut frame, x0, y0, panel_w, panel_h, [60, 60, 70]);
                // title bar
                let bar_h = (panel_h / 10).max(1);
                fill_rect(&mut frame, x0, y0, panel_w, bar_h, [30, 90, 160]);
            }
            Pattern::Camera { hue } => {
                let [r, g, b] = SUBJECT_COLORS[hue % SUBJECT_COLORS.len()];
                let radius = (w.min(h) / 4).max(1);
                let phase = (elapsed_ms % 2000) as f64 / 2000.0 * std::f64::consts::TAU;
                let cx = f64::from(w) / 2.0;
                let cy = f64::from(h) / 2.0 + phase.sin() * f64::from(radius) / 4.0;
                fill_disc(&mut frame, cx, cy, f64::from(radius), [r, g, b]);
            }
        }
        frame
    }
}

fn fill_rect(frame: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, rgb: [u8; 3]) {
    let x1 = x0.saturating_add(w).min(frame.width());
    let y1 = y0.saturating_add(h).min(frame.height());
    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x, y, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        }
    }
}

fn fill_disc(frame: &mut RgbaImage, cx: f64, cy: f64, radius: f64, rgb: [u8; 3]) {
    let r2 = radius * radius;
    for (x, y, px) in frame.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        if dx * dx + dy * dy <= r2 {
            *px = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        }
    }
}

impl VideoTrack for SyntheticTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn current_frame(&self) -> Option<RgbaImage> {
        if self.stopped.load(Ordering::SeqCst) || self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.render(self.started.elapsed().as_millis()))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Stopped synthetic track '{}'", self.label);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

/// Provider backed entirely by synthetic tracks
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    screen_size: (u32, u32),
    camera_size: (u32, u32),
    cameras: Vec<DeviceInfo>,
}

impl SyntheticProvider {
    pub fn new(config: &Config) -> Self {
        let cameras = config
            .sources
            .cameras
            .iter()
            .enumerate()
            .map(|(i, label)| DeviceInfo {
                id: DeviceId(format!("synthetic-camera-{}", i)),
                label: label.clone(),
            })
            .collect();

        Self {
            screen_size: (config.screen.width, config.screen.height),
            camera_size: (config.sources.frame_width, config.sources.frame_height),
            cameras,
        }
    }

    /// Build a synthetic screen-share source without going through a future
    pub fn screen_source(&self) -> MediaSource {
        let (w, h) = self.screen_size;
        let track = SyntheticTrack::new("Synthetic screen", w, h, Pattern::Screen);
        info!("Acquired synthetic screen share ({}x{})", w, h);
        MediaSource::new("screen", vec![Arc::new(track) as Arc<dyn VideoTrack>])
    }

    fn camera_source(&self, device: Option<DeviceId>) -> Result<MediaSource, AcquireError> {
        let (index, camera) = match &device {
            None => self
                .cameras
                .iter()
                .enumerate()
                .next()
                .ok_or(AcquireError::NoDevice(None))?,
            Some(id) => self
                .cameras
                .iter()
                .enumerate()
                .find(|(_, cam)| &cam.id == id)
                .ok_or_else(|| AcquireError::NoDevice(device.clone()))?,
        };

        let (w, h) = self.camera_size;
        let track = SyntheticTrack::new(&camera.label, w, h, Pattern::Camera { hue: index });
        info!(
            "Acquired synthetic camera '{}' ({})",
            camera.label, camera.id
        );
        Ok(MediaSource::new(
            camera.id.0.clone(),
            vec![Arc::new(track) as Arc<dyn VideoTrack>],
        ))
    }
}

impl SourceProvider for SyntheticProvider {
    fn acquire_screen(&self) -> AcquireFuture<MediaSource> {
        let source = self.screen_source();
        async move { Ok(source) }.boxed()
    }

    fn acquire_camera(&self, device: Option<DeviceId>) -> AcquireFuture<MediaSource> {
        let result = self.camera_source(device);
        async move { result }.boxed()
    }

    fn enumerate_video_inputs(&self) -> AcquireFuture<Vec<DeviceInfo>> {
        let cameras = self.cameras.clone();
        async move { Ok(cameras) }.boxed()
    }
}
