//! Input capture backend trait

use crate::config::InputBackendKind;
use crate::input::InputEvent;
use anyhow::Result;
use tokio::sync::mpsc;

/// Trait for input capture backends
pub trait InputBackend: Send {
    /// Start capturing input events
    /// Events are sent to the provided channel; dropping the sender signals
    /// the end of input.
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()>;
}

/// Create the requested input backend
pub fn create_input_backend(kind: InputBackendKind) -> Result<Box<dyn InputBackend>> {
    match kind {
        InputBackendKind::Stdin => {
            tracing::info!("Using stdin backend for input (JSON lines)");
            Ok(Box::new(super::stdin_backend::StdinBackend::new()))
        }
        #[cfg(feature = "global-input")]
        InputBackendKind::Global => {
            tracing::info!("Using rdev backend for input capture");
            Ok(Box::new(super::rdev_backend::RdevBackend::new()))
        }
        #[cfg(not(feature = "global-input"))]
        InputBackendKind::Global => {
            anyhow::bail!("Global input capture requires the `global-input` feature")
        }
    }
}
