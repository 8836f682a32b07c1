//! One on-stage item wrapping a single media source

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, info, warn};

use super::{ItemId, MAX_LEFT_PERCENT, MIN_LEFT_PERCENT};
use crate::config::KeyingConfig;
use crate::keying::{KeyedSurface, KeyerHandle};
use crate::source::MediaSource;

/// Fallback aspect ratio for tracks that have not reported a size yet
const DEFAULT_ASPECT: f64 = 16.0 / 9.0;

/// How an item is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    /// The source's own frames
    Raw,
    /// Chroma-keyed through a compositing loop
    Keyed(KeyedSurface),
}

/// An on-stage occupant
#[derive(Debug)]
pub struct Item {
    id: ItemId,
    left_percent: i32,
    source: Option<MediaSource>,
    title_fragment: Option<String>,
    keyer: Option<KeyerHandle>,
    surface: KeyedSurface,
}

impl Item {
    pub(super) fn new(source: MediaSource, left_percent: i32, title_fragment: String) -> Self {
        Self {
            id: ItemId::new(),
            left_percent: left_percent.clamp(MIN_LEFT_PERCENT, MAX_LEFT_PERCENT),
            source: Some(source),
            title_fragment: Some(title_fragment),
            keyer: None,
            surface: KeyedSurface::Live,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn left_percent(&self) -> i32 {
        self.left_percent
    }

    pub(super) fn set_left_percent(&mut self, percent: i32) {
        self.left_percent = percent.clamp(MIN_LEFT_PERCENT, MAX_LEFT_PERCENT);
    }

    #[cfg(test)]
    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn label(&self) -> &str {
        self.source.as_ref().map(|s| s.track_label()).unwrap_or("")
    }

    pub fn mode(&self) -> PresentationMode {
        match self.keyer {
            Some(_) => PresentationMode::Keyed(self.surface),
            None => PresentationMode::Raw,
        }
    }

    #[cfg(test)]
    pub fn keyer(&self) -> Option<&KeyerHandle> {
        self.keyer.as_ref()
    }

    /// Advance the key mode after a modifier-click.
    ///
    /// Raw starts the compositing loop on the live surface; a keyed item
    /// swaps between the live and buffer surfaces, or returns to Raw when
    /// `release` is set.
    pub fn toggle_key_mode(&mut self, release: bool, keying: &KeyingConfig) -> PresentationMode {
        if self.keyer.is_some() {
            if release {
                self.leave_keyed();
            } else {
                self.surface = self.surface.swapped();
                debug!(
                    "Item {} now presents {:?} surface (frame {:?})",
                    self.id,
                    self.surface,
                    self.keyer
                        .as_ref()
                        .and_then(|k| k.latest())
                        .map(|f| f.sequence)
                );
            }
            return self.mode();
        }

        let Some(track) = self.source.as_ref().and_then(|s| s.first_video_track()) else {
            warn!("Item {} has no video track to key", self.id);
            return self.mode();
        };

        info!(
            "Item {} ('{}') entering keyed mode at {} fps",
            self.id,
            track.label(),
            keying.frame_rate
        );
        self.keyer = Some(KeyerHandle::spawn(
            track,
            keying.frame_rate,
            keying.threshold,
        ));
        self.surface = KeyedSurface::Live;
        self.mode()
    }

    fn leave_keyed(&mut self) {
        if let Some(keyer) = self.keyer.take() {
            keyer.stop();
            info!("Item {} back to raw mode", self.id);
        }
        self.surface = KeyedSurface::Live;
    }

    /// The frame currently presented, at the source's natural size
    pub fn presented_frame(&self) -> Option<Arc<RgbaImage>> {
        match (&self.keyer, self.surface) {
            (Some(keyer), KeyedSurface::Live) => keyer.latest().map(|f| f.keyed),
            (Some(keyer), KeyedSurface::Buffer) => keyer.latest().map(|f| f.capture),
            (None, _) => self
                .source
                .as_ref()?
                .first_video_track()?
                .current_frame()
                .map(Arc::new),
        }
    }

    /// Left edge in stage pixels
    pub fn left_px(&self, stage_width: f64) -> f64 {
        f64::from(self.left_percent) / 100.0 * stage_width
    }

    /// Width in stage pixels for a full-height item
    pub fn width_px(&self, stage_height: f64) -> f64 {
        let aspect = self
            .source
            .as_ref()
            .and_then(|s| s.first_video_track())
            .and_then(|t| t.dimensions())
            .filter(|(w, h)| *w > 0 && *h > 0)
            .map(|(w, h)| f64::from(w) / f64::from(h))
            .unwrap_or(DEFAULT_ASPECT);
        stage_height * aspect
    }

    /// Tear down: stop compositing, stop every track and unbind the source.
    ///
    /// Returns the title fragment to remove the first time only.
    pub(super) fn destroy(&mut self) -> Option<String> {
        self.leave_keyed();
        if let Some(source) = self.source.take() {
            source.stop();
            info!("Item {} ('{}') destroyed", self.id, source.track_label());
        }
        self.title_fragment.take()
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{source_with_label, StaticTrack};
    use crate::source::VideoTrack;
    use image::Rgba;

    fn keying() -> KeyingConfig {
        KeyingConfig::default()
    }

    #[test]
    fn test_new_item_is_raw_and_clamped() {
        let (source, _) = source_with_label("cam");
        let item = Item::new(source, 140, " [cam]".into());
        assert_eq!(item.mode(), PresentationMode::Raw);
        assert_eq!(item.left_percent(), MAX_LEFT_PERCENT);
        assert_eq!(item.label(), "cam");
    }

    #[test]
    fn test_geometry_uses_track_aspect() {
        let (source, _) = source_with_label("cam");
        let item = Item::new(source, 25, String::new());
        assert_eq!(item.left_px(1000.0), 250.0);
        // 16x9 test frames
        assert_eq!(item.width_px(900.0), 1600.0);

        let empty = MediaSource::new(
            "none",
            vec![StaticTrack::empty("none") as Arc<dyn VideoTrack>],
        );
        let item = Item::new(empty, 0, String::new());
        assert!((item.width_px(90.0) - 160.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_toggle_cycles_surfaces_then_releases() {
        let (source, _) = source_with_label("cam");
        let mut item = Item::new(source, 0, String::new());

        assert_eq!(
            item.toggle_key_mode(false, &keying()),
            PresentationMode::Keyed(KeyedSurface::Live)
        );
        assert!(item.keyer().unwrap().is_running());
        assert_eq!(
            item.toggle_key_mode(false, &keying()),
            PresentationMode::Keyed(KeyedSurface::Buffer)
        );
        assert_eq!(
            item.toggle_key_mode(false, &keying()),
            PresentationMode::Keyed(KeyedSurface::Live)
        );

        let mut frames = item.keyer().unwrap().subscribe();
        assert_eq!(item.toggle_key_mode(true, &keying()), PresentationMode::Raw);
        assert!(item.keyer().is_none());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // Drain whatever was published before the stop; then the channel is closed.
        while frames.changed().await.is_ok() {}
    }

    #[tokio::test]
    async fn test_presented_frame_follows_surface() {
        let white = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        let track = StaticTrack::new("cam", white);
        let source = MediaSource::new("cam", vec![track as Arc<dyn VideoTrack>]);
        let mut item = Item::new(source, 0, String::new());

        assert_eq!(item.presented_frame().unwrap().get_pixel(0, 0).0[3], 255);

        item.toggle_key_mode(false, &keying());
        let mut frames = item.keyer().unwrap().subscribe();
        frames.changed().await.unwrap();
        assert_eq!(item.presented_frame().unwrap().get_pixel(0, 0).0[3], 0);

        item.toggle_key_mode(false, &keying());
        assert_eq!(item.presented_frame().unwrap().get_pixel(0, 0).0[3], 255);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (source, track) = source_with_label("cam");
        let mut item = Item::new(source, 0, " [cam]".into());
        item.toggle_key_mode(false, &keying());

        assert_eq!(item.destroy().as_deref(), Some(" [cam]"));
        assert!(item.keyer().is_none());
        assert!(item.source().is_none());
        assert!(!track.is_live());
        assert_eq!(track.stop_calls(), 1);

        assert_eq!(item.destroy(), None);
        drop(item);
        assert_eq!(track.stop_calls(), 1);
    }

    #[test]
    fn test_drop_stops_source() {
        let (source, track) = source_with_label("cam");
        drop(Item::new(source, 0, String::new()));
        assert!(!track.is_live());
    }
}
