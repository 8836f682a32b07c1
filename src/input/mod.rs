//! Input capture and interpretation

mod backend;
pub mod chord;
mod events;
pub mod gesture;
pub(crate) mod stdin_backend;

#[cfg(feature = "global-input")]
pub(crate) mod rdev_backend;

pub use backend::*;
pub use events::*;
