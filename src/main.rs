//! broadcast-stage
//!
//! Live compositing stage: screen shares and cameras as draggable items,
//! optional near-white chroma keying, and keyboard chords for adding,
//! removing and reordering sources.

mod config;
mod director;
mod input;
mod keying;
mod logging;
mod source;
mod stage;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use config::{Config, InputBackendKind};
use director::{create_engine_channels, EngineCommand, EngineStatus, StageEngine};
use input::create_input_backend;
use source::create_source_provider;

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    input: Option<InputBackendKind>,
    snapshot: Option<PathBuf>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--input" => {
                let kind = args.next().context("--input needs stdin or global")?;
                parsed.input = Some(match kind.as_str() {
                    "stdin" => InputBackendKind::Stdin,
                    "global" => InputBackendKind::Global,
                    other => bail!("Unknown input backend '{}'", other),
                });
            }
            "--snapshot" => {
                let path = args.next().context("--snapshot needs a path")?;
                parsed.snapshot = Some(PathBuf::from(path));
            }
            other => bail!("Unknown argument '{}' (see --help)", other),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        print_help();
        return Ok(());
    }

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = logging::init_logging()?;
    info!("broadcast-stage starting...");

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path().ok());

    if let Some(kind) = args.input {
        config.input.backend = kind;
    }

    let runtime = Arc::new(tokio::runtime::Runtime::new()?);

    let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();

    let input_backend = create_input_backend(config.input.backend)?;
    let provider = create_source_provider(&config);
    let mut engine = StageEngine::new(config, provider, input_backend, cmd_rx, status_tx);
    if let Some(path) = args.snapshot {
        engine.snapshot_on_exit(path);
    }

    runtime.spawn(present_status(status_rx));

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_tx = cmd_tx.clone();
    let ctrl_c_runtime = runtime.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let tx = ctrl_c_tx.clone();
        ctrl_c_runtime.spawn(async move {
            let _ = tx.send(EngineCommand::Shutdown).await;
        });
    })?;

    if let Err(e) = runtime.block_on(engine.run()) {
        error!("Stage engine error: {}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Print the status line and window title as they change
async fn present_status(mut status_rx: broadcast::Receiver<EngineStatus>) {
    loop {
        match status_rx.recv().await {
            Ok(EngineStatus::Message(text)) => println!("status: {}", text),
            Ok(EngineStatus::Title(title)) => println!("title: {}", title),
            Ok(EngineStatus::Items(count)) => println!("items: {}", count),
            Ok(EngineStatus::Error(e)) => println!("error: {}", e),
            Ok(EngineStatus::Ready) => println!("ready"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Status display skipped {} updates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_help() {
    println!("broadcast-stage - Live camera and screen-share compositing stage");
    println!();
    println!("USAGE:");
    println!("    broadcast-stage [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print this help message");
    println!("    --config <path>        Load configuration from <path>");
    println!("    --input <stdin|global> Input backend (overrides config)");
    println!("    --snapshot <png>       Write the composed stage to <png> on exit");
    println!();
    println!("CHORDS:");
    println!("    + s    add a screen share       + c    add a camera");
    println!("    -      remove the next clicked  0 0    remove everything");
    println!("    1-9    bring slot N to front    Esc    cancel");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                    Set log level (e.g., debug, info, warn)");
    println!("    BROADCAST_STAGE_LOG_PATH    Override the log directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_all_options() {
        let parsed = args(&[
            "--config",
            "stage.toml",
            "--input",
            "global",
            "--snapshot",
            "out.png",
        ])
        .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("stage.toml")));
        assert_eq!(parsed.input, Some(InputBackendKind::Global));
        assert_eq!(parsed.snapshot, Some(PathBuf::from("out.png")));
        assert!(!parsed.help);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(args(&["--input", "mouse"]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--frobnicate"]).is_err());
        assert!(args(&["-h"]).unwrap().help);
    }
}
