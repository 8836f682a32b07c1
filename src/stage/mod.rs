//! The stage: items in paint order, their geometry and the window title

mod collection;
mod item;
mod title;

use std::fmt;

use uuid::Uuid;

pub use collection::Stage;

#[cfg(test)]
pub use item::PresentationMode;

/// Leftmost allowed item offset, in percent of stage width
pub const MIN_LEFT_PERCENT: i32 = -20;

/// Rightmost allowed item offset, in percent of stage width
pub const MAX_LEFT_PERCENT: i32 = 90;

/// Unique identity of an on-stage item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}
