//! Stage director - routes input and acquisitions into stage mutations

mod engine;

pub use engine::{create_engine_channels, StageEngine};

/// Commands that can be sent to the stage engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Shutdown the engine
    Shutdown,
}

/// Status updates from the stage engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Engine is running and accepting input
    Ready,
    /// The single-line status message changed (empty clears it)
    Message(String),
    /// The window title changed
    Title(String),
    /// Number of items on stage changed
    Items(usize),
    /// An error occurred
    Error(String),
}
