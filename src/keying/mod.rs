//! Near-white chroma keying
//!
//! The keyer is a pure per-frame transform. The compositor drives it at a
//! fixed frame rate for every item in keyed mode and publishes both the
//! capture snapshot and the keyed result.

mod compositor;
mod keyer;

pub use compositor::{KeyedSurface, KeyerHandle};
pub use keyer::DEFAULT_THRESHOLD;
