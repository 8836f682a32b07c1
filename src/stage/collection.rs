//! Ordered collection of items
//!
//! Order is paint order: index 0 is painted first (bottom), the last item is
//! topmost. Reordering never changes anything but position in the sequence.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, info};

use super::item::Item;
use super::title::WindowTitle;
use super::ItemId;
use crate::config::StageConfig;
use crate::source::MediaSource;

#[derive(Debug)]
pub struct Stage {
    items: Vec<Item>,
    width: f64,
    height: f64,
    spacing_percent: i32,
    title: WindowTitle,
}

impl Stage {
    pub fn new(config: &StageConfig) -> Self {
        Self {
            items: Vec::new(),
            width: f64::from(config.width.max(1)),
            height: f64::from(config.height.max(1)),
            spacing_percent: config.spacing_percent,
            title: WindowTitle::new(config.base_title.clone()),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item ids in paint order, bottom first
    #[cfg(test)]
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(Item::id).collect()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Create an item for `source` and put it on top.
    ///
    /// New items start `spacing_percent` times the current item count from
    /// the left, and extend the window title with the track label.
    pub fn add(&mut self, source: MediaSource) -> ItemId {
        let left = self.spacing_percent.saturating_mul(self.items.len() as i32);
        let fragment = self.title.append(source.track_label());
        let item = Item::new(source, left, fragment);
        let id = item.id();
        info!(
            "Added item {} ('{}') at {}%",
            id,
            item.label(),
            item.left_percent()
        );
        self.append_top(item);
        id
    }

    /// Insert a new item as topmost
    pub fn append_top(&mut self, item: Item) {
        debug_assert!(self.index_of(item.id()).is_none());
        self.items.push(item);
    }

    /// Insert a new item as bottommost
    pub fn insert_bottom(&mut self, item: Item) {
        debug_assert!(self.index_of(item.id()).is_none());
        self.items.insert(0, item);
    }

    /// Move an existing item to the top. Returns false if it is not on stage.
    pub fn raise(&mut self, id: ItemId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let item = self.items.remove(index);
        self.append_top(item);
        debug!("Raised item {}", id);
        true
    }

    /// Move an existing item to the bottom. Returns false if it is not on stage.
    pub fn lower(&mut self, id: ItemId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let item = self.items.remove(index);
        self.insert_bottom(item);
        debug!("Lowered item {}", id);
        true
    }

    /// Update an item's horizontal offset (clamped)
    pub fn set_left(&mut self, id: ItemId, percent: i32) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.set_left_percent(percent);
                true
            }
            None => false,
        }
    }

    /// Remove and destroy one item
    pub fn remove(&mut self, id: ItemId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let mut item = self.items.remove(index);
        self.teardown(&mut item);
        true
    }

    /// Remove and destroy every item. Returns how many were removed.
    pub fn remove_all(&mut self) -> usize {
        let items = std::mem::take(&mut self.items);
        let count = items.len();
        for mut item in items {
            self.teardown(&mut item);
        }
        if count > 0 {
            info!("Removed all {} items", count);
        }
        count
    }

    fn teardown(&mut self, item: &mut Item) {
        if let Some(fragment) = item.destroy() {
            self.title.remove(&fragment);
        }
    }

    /// Item ids sorted by ascending horizontal offset (stable for ties)
    pub fn ordered_by_slot(&self) -> Vec<ItemId> {
        let mut slots: Vec<&Item> = self.items.iter().collect();
        slots.sort_by_key(|item| item.left_percent());
        slots.into_iter().map(Item::id).collect()
    }

    /// Raise the item in 1-based slot `n`. No-op when there is no such slot.
    pub fn bring_slot_to_front(&mut self, n: usize) -> Option<ItemId> {
        let id = *self.ordered_by_slot().get(n.checked_sub(1)?)?;
        self.raise(id);
        Some(id)
    }

    /// Topmost item whose rectangle contains the point
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ItemId> {
        if !(0.0..self.height).contains(&y) {
            return None;
        }
        self.items
            .iter()
            .rev()
            .find(|item| {
                let left = item.left_px(self.width);
                let right = left + item.width_px(self.height);
                (left..right).contains(&x)
            })
            .map(Item::id)
    }

    /// Paint every item's presented surface, bottom first, onto a
    /// transparent stage-sized image
    pub fn compose(&self) -> RgbaImage {
        let (width, height) = (self.width as u32, self.height as u32);
        let mut canvas = RgbaImage::new(width, height);

        for item in &self.items {
            let Some(frame) = item.presented_frame() else {
                continue;
            };
            let target_w = item.width_px(self.height).round().max(1.0) as u32;
            let scaled;
            let layer = if frame.dimensions() == (target_w, height) {
                frame.as_ref()
            } else {
                scaled = imageops::resize(frame.as_ref(), target_w, height, FilterType::Triangle);
                &scaled
            };
            let x = item.left_px(self.width).round() as i64;
            imageops::overlay(&mut canvas, layer, x, 0);
        }
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{source_with_label, StaticTrack};
    use crate::source::VideoTrack;
    use image::Rgba;
    use std::sync::Arc;

    fn stage() -> Stage {
        Stage::new(&StageConfig {
            width: 1000,
            height: 90,
            base_title: "broadcast".to_string(),
            spacing_percent: 10,
        })
    }

    fn add(stage: &mut Stage, label: &str) -> ItemId {
        stage.add(source_with_label(label).0)
    }

    #[test]
    fn test_add_spaces_items_and_stacks_on_top() {
        let mut stage = stage();
        let a = add(&mut stage, "a");
        let b = add(&mut stage, "b");
        let c = add(&mut stage, "c");
        assert_eq!(stage.ids(), vec![a, b, c]);
        assert_eq!(stage.get(a).unwrap().left_percent(), 0);
        assert_eq!(stage.get(b).unwrap().left_percent(), 10);
        assert_eq!(stage.get(c).unwrap().left_percent(), 20);
        assert_eq!(stage.title(), "broadcast [a] [b] [c]");
    }

    #[test]
    fn test_raise_and_lower_only_reorder() {
        let mut stage = stage();
        let a = add(&mut stage, "a");
        let b = add(&mut stage, "b");
        let c = add(&mut stage, "c");

        assert!(stage.raise(a));
        assert_eq!(stage.ids(), vec![b, c, a]);
        assert!(stage.lower(c));
        assert_eq!(stage.ids(), vec![c, b, a]);
        assert_eq!(stage.get(c).unwrap().left_percent(), 20);
        assert!(!stage.raise(ItemId::new()));
        assert_eq!(stage.len(), 3);
    }

    #[test]
    fn test_slot_order_is_by_offset_not_z_order() {
        let mut stage = stage();
        let a = add(&mut stage, "a");
        let b = add(&mut stage, "b");
        let c = add(&mut stage, "c");
        stage.set_left(a, 50);
        stage.set_left(c, 5);
        assert_eq!(stage.ordered_by_slot(), vec![c, b, a]);

        // Ties keep paint order
        stage.set_left(b, 50);
        assert_eq!(stage.ordered_by_slot(), vec![c, a, b]);
    }

    #[test]
    fn test_bring_slot_to_front() {
        let mut stage = stage();
        let a = add(&mut stage, "a");
        let b = add(&mut stage, "b");
        let c = add(&mut stage, "c");

        assert_eq!(stage.bring_slot_to_front(1), Some(a));
        assert_eq!(stage.ids(), vec![b, c, a]);
        assert_eq!(stage.bring_slot_to_front(2), Some(b));
        assert_eq!(stage.ids(), vec![c, a, b]);

        assert_eq!(stage.bring_slot_to_front(4), None);
        assert_eq!(stage.bring_slot_to_front(0), None);
        assert_eq!(stage.ids(), vec![c, a, b]);
    }

    #[test]
    fn test_remove_all_for_any_count() {
        for count in [0, 1, 5] {
            let mut stage = stage();
            let tracks: Vec<_> = (0..count)
                .map(|i| {
                    let (source, track) = source_with_label(&format!("s{}", i));
                    stage.add(source);
                    track
                })
                .collect();
            assert_eq!(stage.remove_all(), count);
            assert!(stage.is_empty());
            assert_eq!(stage.title(), "broadcast");
            assert!(tracks.iter().all(|t| !t.is_live()));
        }
    }

    #[test]
    fn test_remove_first_keeps_second_fragment() {
        let mut stage = stage();
        let screen = add(&mut stage, "Display 1");
        let camera = add(&mut stage, "FaceTime HD Camera");
        assert_eq!(stage.title(), "broadcast [Display 1] [FaceTime HD Camera]");

        assert!(stage.remove(screen));
        assert_eq!(stage.title(), "broadcast [FaceTime HD Camera]");
        assert!(!stage.remove(screen));
        assert_eq!(stage.ids(), vec![camera]);
    }

    #[test]
    fn test_new_items_start_at_count_times_spacing_after_removal() {
        let mut stage = stage();
        let a = add(&mut stage, "a");
        add(&mut stage, "b");
        stage.remove(a);
        let c = add(&mut stage, "c");
        assert_eq!(stage.get(c).unwrap().left_percent(), 10);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut stage = stage();
        // 16:9 frames at height 90 are 160px wide
        let a = add(&mut stage, "a"); // 0..160
        let b = add(&mut stage, "b"); // 100..260
        assert_eq!(stage.hit_test(50.0, 10.0), Some(a));
        assert_eq!(stage.hit_test(120.0, 10.0), Some(b));
        assert_eq!(stage.hit_test(300.0, 10.0), None);
        assert_eq!(stage.hit_test(120.0, 95.0), None);

        stage.raise(a);
        assert_eq!(stage.hit_test(120.0, 10.0), Some(a));
    }

    #[test]
    fn test_compose_paints_in_order() {
        let mut stage = Stage::new(&StageConfig {
            width: 4,
            height: 2,
            base_title: String::new(),
            spacing_percent: 0,
        });
        let red = StaticTrack::new("red", RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        let blue = StaticTrack::new("blue", RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])));
        stage.add(MediaSource::new("red", vec![red as Arc<dyn VideoTrack>]));
        let top = stage.add(MediaSource::new("blue", vec![blue as Arc<dyn VideoTrack>]));

        let canvas = stage.compose();
        assert_eq!(canvas.dimensions(), (4, 2));
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(canvas.get_pixel(3, 0).0[3], 0);

        stage.lower(top);
        assert_eq!(stage.compose().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
