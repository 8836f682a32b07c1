//! Pointer gestures
//!
//! Raw press/move/release events become clicks, double clicks, context-menu
//! requests and drag sessions here. Targets are resolved by the caller (stage
//! hit testing) at press and release time.

use super::events::{Modifiers, MouseButton};
use crate::stage::{ItemId, MAX_LEFT_PERCENT, MIN_LEFT_PERCENT};

/// Left offset, in clamped whole percent, for a drag that started at
/// `init_x` over an item whose left edge was at `init_left_px`.
pub fn drag_offset(init_x: f64, init_left_px: f64, current_x: f64, stage_width: f64) -> i32 {
    let left = (current_x - init_x + init_left_px) / stage_width.max(1.0);
    clamp_left(round_half_up(left * 100.0))
}

fn round_half_up(v: f64) -> i64 {
    // Saturating cast; NaN becomes 0.
    (v + 0.5).floor() as i64
}

fn clamp_left(v: i64) -> i32 {
    v.clamp(i64::from(MIN_LEFT_PERCENT), i64::from(MAX_LEFT_PERCENT)) as i32
}

/// One drag, from pointer down to pointer up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub item: ItemId,
    init_x: f64,
    init_left_px: f64,
}

impl DragSession {
    pub fn begin(item: ItemId, init_x: f64, init_left_px: f64) -> Self {
        Self {
            item,
            init_x,
            init_left_px,
        }
    }

    /// Left offset for the pointer at `x`
    pub fn offset_at(&self, x: f64, stage_width: f64) -> i32 {
        drag_offset(self.init_x, self.init_left_px, x, stage_width)
    }
}

/// Gesture synthesized from raw pointer events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Click {
        target: Option<ItemId>,
        modifiers: Modifiers,
    },
    DoubleClick {
        target: Option<ItemId>,
        modifiers: Modifiers,
    },
    ContextMenu {
        target: Option<ItemId>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Press {
    button: MouseButton,
    target: Option<ItemId>,
}

#[derive(Debug, Clone, Copy)]
struct LastClick {
    at_us: u64,
    target: Option<ItemId>,
}

/// Click and double-click synthesis
#[derive(Debug)]
pub struct PointerTracker {
    double_click_us: u64,
    pressed: Option<Press>,
    last_click: Option<LastClick>,
}

impl PointerTracker {
    pub fn new(double_click_ms: u64) -> Self {
        Self {
            double_click_us: double_click_ms.saturating_mul(1000),
            pressed: None,
            last_click: None,
        }
    }

    /// Record a button press. A secondary-button press asks for a context menu.
    pub fn press(&mut self, button: MouseButton, target: Option<ItemId>) -> Option<Gesture> {
        self.pressed = Some(Press { button, target });
        match button {
            MouseButton::Right => Some(Gesture::ContextMenu { target }),
            _ => None,
        }
    }

    /// Record a button release and return the gestures it completes.
    ///
    /// A primary-button release after a press yields a click, targeted only
    /// when press and release landed on the same item; a second click on the
    /// same target within the double-click window also yields a double click.
    pub fn release(
        &mut self,
        timestamp_us: u64,
        button: MouseButton,
        target: Option<ItemId>,
        modifiers: Modifiers,
    ) -> Vec<Gesture> {
        let Some(press) = self.pressed.take() else {
            return Vec::new();
        };
        if press.button != button || button != MouseButton::Left {
            return Vec::new();
        }

        let target = if press.target == target { target } else { None };
        let mut gestures = vec![Gesture::Click { target, modifiers }];

        match self.last_click {
            Some(last)
                if last.target == target
                    && timestamp_us.saturating_sub(last.at_us) <= self.double_click_us =>
            {
                gestures.push(Gesture::DoubleClick { target, modifiers });
                self.last_click = None;
            }
            _ => {
                self.last_click = Some(LastClick {
                    at_us: timestamp_us,
                    target,
                });
            }
        }
        gestures
    }
}
