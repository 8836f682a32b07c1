//! Stage engine
//!
//! Owns the stage and every piece of interaction state. Input events,
//! acquisition results and host commands all arrive on channels and are
//! handled one at a time on the engine task, so nothing here needs a lock.
//!
//! Acquisitions run on spawned tasks and report back when they finish; a
//! slow permission prompt never blocks keyboard or mouse handling.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::input::chord::{ChordInterpreter, Command};
use crate::input::gesture::{DragSession, Gesture, PointerTracker};
use crate::input::{
    EventType, InputBackend, InputEvent, Key, MouseButton, MouseButtonEvent, MouseMoveEvent,
};
use crate::source::{AcquireError, DeviceId, DeviceInfo, MediaSource, SourceProvider};
use crate::stage::Stage;

use super::{EngineCommand, EngineStatus};

/// What a spawned acquisition asked for
#[derive(Debug, Clone)]
enum Acquisition {
    Screen,
    /// Default camera, asking the user to choose when several exist
    AnyCamera,
    Camera(DeviceId),
}

/// Result reported back by an acquisition task
#[derive(Debug)]
enum Acquired {
    Ready(MediaSource),
    ChooseCamera(Vec<DeviceInfo>),
    Failed(AcquireError),
}

pub struct StageEngine {
    /// Configuration
    config: Config,
    /// Items in paint order plus the window title
    stage: Stage,
    /// Keyboard chords and the pending camera choice
    chord: ChordInterpreter,
    /// Click and double-click synthesis
    pointer: PointerTracker,
    /// Active drag, from primary press to release
    drag: Option<DragSession>,
    /// Status line text
    message: String,
    /// Source acquisition collaborator
    provider: Arc<dyn SourceProvider>,
    /// Input capture backend
    input_backend: Box<dyn InputBackend>,
    /// Command receiver
    cmd_rx: mpsc::Receiver<EngineCommand>,
    /// Status broadcaster
    status_tx: broadcast::Sender<EngineStatus>,
    acquire_tx: mpsc::UnboundedSender<Acquired>,
    acquire_rx: mpsc::UnboundedReceiver<Acquired>,
    /// Acquisitions spawned but not yet reported
    pending: usize,
    /// Where to write the composed stage on exit
    snapshot_path: Option<PathBuf>,
}

impl StageEngine {
    pub fn new(
        config: Config,
        provider: Arc<dyn SourceProvider>,
        input_backend: Box<dyn InputBackend>,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        let (acquire_tx, acquire_rx) = mpsc::unbounded_channel();
        Self {
            stage: Stage::new(&config.stage),
            pointer: PointerTracker::new(config.input.double_click_ms),
            chord: ChordInterpreter::new(),
            drag: None,
            message: String::new(),
            config,
            provider,
            input_backend,
            cmd_rx,
            status_tx,
            acquire_tx,
            acquire_rx,
            pending: 0,
            snapshot_path: None,
        }
    }

    /// Write the composed stage as PNG when the engine stops
    pub fn snapshot_on_exit(&mut self, path: PathBuf) {
        self.snapshot_path = Some(path);
    }

    /// Run the engine main loop
    ///
    /// Returns on `EngineCommand::Shutdown`, or once input has ended and
    /// every outstanding acquisition has reported back.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Stage engine starting ({}x{}, keying at {} fps)",
            self.config.stage.width, self.config.stage.height, self.config.keying.frame_rate
        );

        // Start input capture (events go to a channel)
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        self.input_backend.start(input_tx)?;
        let mut input_open = true;

        let _ = self.status_tx.send(EngineStatus::Ready);
        let _ = self
            .status_tx
            .send(EngineStatus::Title(self.stage.title().to_string()));

        loop {
            tokio::select! {
                // Handle commands
                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        EngineCommand::Shutdown => {
                            info!("Shutdown command received");
                            break;
                        }
                    }
                }

                // Handle input events
                event = input_rx.recv(), if input_open => {
                    match event {
                        Some(event) => self.handle_input(event),
                        None => {
                            info!("Input ended");
                            input_open = false;
                        }
                    }
                }

                // Handle finished acquisitions
                Some(outcome) = self.acquire_rx.recv() => {
                    self.handle_acquired(outcome);
                }
            }

            if !input_open && self.pending == 0 {
                break;
            }
        }

        self.finish();
        info!("Stage engine stopped");
        Ok(())
    }

    fn finish(&mut self) {
        // Late arrivals never reach the stage
        while let Ok(outcome) = self.acquire_rx.try_recv() {
            if let Acquired::Ready(source) = outcome {
                source.stop();
            }
        }

        if let Some(path) = self.snapshot_path.take() {
            match self.stage.compose().save(&path) {
                Ok(()) => info!("Wrote stage snapshot to {:?}", path),
                Err(e) => error!("Failed to write stage snapshot {:?}: {}", path, e),
            }
        }

        if !self.stage.is_empty() {
            self.stage.remove_all();
            self.publish_stage();
        }
    }

    /// Handle one input event
    fn handle_input(&mut self, event: InputEvent) {
        let InputEvent {
            timestamp_us,
            event,
        } = event;

        match event {
            EventType::KeyPress(_) => {}
            EventType::KeyRelease(key) => self.handle_key(key.key()),
            EventType::MousePress(press) => self.handle_press(&press),
            EventType::MouseMove(motion) => self.handle_move(&motion),
            EventType::MouseRelease(release) => self.handle_release(timestamp_us, &release),
        }
    }

    fn handle_key(&mut self, key: Key) {
        let reaction = self.chord.on_key(key);
        if let Some(message) = reaction.message {
            self.set_message(message);
        }
        if let Some(command) = reaction.command {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: Command) {
        debug!("Executing {:?}", command);
        match command {
            Command::AddScreen => self.spawn_acquisition(Acquisition::Screen),
            Command::AddCamera => self.spawn_acquisition(Acquisition::AnyCamera),
            Command::UseCamera(device) => {
                info!("Using camera '{}'", device.label);
                self.spawn_acquisition(Acquisition::Camera(device.id));
            }
            Command::RemoveAll => {
                self.stage.remove_all();
                self.publish_stage();
            }
            Command::BringToFront(n) => match self.stage.bring_slot_to_front(n) {
                Some(id) => debug!("Brought slot {} ({}) to front", n, id),
                None => debug!("No item in slot {}", n),
            },
        }
    }

    fn handle_press(&mut self, press: &MouseButtonEvent) {
        let target = self.stage.hit_test(press.x, press.y);

        if press.button == MouseButton::Left {
            self.drag = target.and_then(|id| {
                let left_px = self.stage.get(id)?.left_px(self.stage.width());
                Some(DragSession::begin(id, press.x, left_px))
            });
        }

        if let Some(Gesture::ContextMenu { target }) = self.pointer.press(press.button, target) {
            // Swallowed so the platform menu never covers the stage
            debug!("Suppressed context menu on {:?}", target);
        }
    }

    fn handle_move(&mut self, motion: &MouseMoveEvent) {
        let Some(drag) = &self.drag else {
            return;
        };
        let percent = drag.offset_at(motion.x, self.stage.width());
        if !self.stage.set_left(drag.item, percent) {
            // Item went away mid-drag
            self.drag = None;
        }
    }

    fn handle_release(&mut self, timestamp_us: u64, release: &MouseButtonEvent) {
        if release.button == MouseButton::Left {
            if let Some(drag) = self.drag.take() {
                debug!(
                    "Drag of {} ended at {:?}%",
                    drag.item,
                    self.stage.get(drag.item).map(|item| item.left_percent())
                );
            }
        }

        let target = self.stage.hit_test(release.x, release.y);
        for gesture in self
            .pointer
            .release(timestamp_us, release.button, target, release.modifiers)
        {
            self.handle_gesture(gesture);
        }
    }

    fn handle_gesture(&mut self, gesture: Gesture) {
        let input = &self.config.input;
        match gesture {
            Gesture::Click { target, modifiers } => {
                if let Some(id) = target.filter(|_| modifiers.contains(input.toggle_modifier)) {
                    let release = modifiers.contains(input.lower_modifier);
                    if let Some(item) = self.stage.get_mut(id) {
                        let mode = item.toggle_key_mode(release, &self.config.keying);
                        debug!("Item {} now {:?}", id, mode);
                    }
                }

                if self.chord.take_remove_click() {
                    self.set_message(String::new());
                    if let Some(id) = target {
                        self.stage.remove(id);
                        self.publish_stage();
                    }
                }
            }
            Gesture::DoubleClick {
                target: Some(id),
                modifiers,
            } => {
                if modifiers.contains(input.lower_modifier) {
                    self.stage.lower(id);
                } else {
                    self.stage.raise(id);
                }
            }
            Gesture::DoubleClick { target: None, .. } | Gesture::ContextMenu { .. } => {}
        }
    }

    fn spawn_acquisition(&mut self, request: Acquisition) {
        let provider = self.provider.clone();
        let tx = self.acquire_tx.clone();
        self.pending += 1;

        tokio::spawn(async move {
            let outcome = match acquire(provider, request).await {
                Ok(outcome) => outcome,
                Err(e) => Acquired::Failed(e),
            };
            let _ = tx.send(outcome);
        });
    }

    fn handle_acquired(&mut self, outcome: Acquired) {
        self.pending = self.pending.saturating_sub(1);

        match outcome {
            Acquired::Ready(source) => {
                self.stage.add(source);
                self.publish_stage();
            }
            Acquired::ChooseCamera(cameras) => {
                info!("{} cameras available, waiting for a choice", cameras.len());
                let prompt = self.chord.arm_camera_choice(cameras);
                self.set_message(prompt);
            }
            Acquired::Failed(e) => {
                warn!("Source acquisition failed: {}", e);
                let _ = self.status_tx.send(EngineStatus::Error(e.to_string()));
            }
        }
    }

    fn set_message(&mut self, message: String) {
        if self.message != message {
            self.message = message.clone();
            let _ = self.status_tx.send(EngineStatus::Message(message));
        }
    }

    fn publish_stage(&self) {
        let _ = self
            .status_tx
            .send(EngineStatus::Title(self.stage.title().to_string()));
        let _ = self.status_tx.send(EngineStatus::Items(self.stage.len()));
    }

    /// Drive acquisitions to completion without a running loop
    #[cfg(test)]
    async fn settle(&mut self) {
        while self.pending > 0 {
            match self.acquire_rx.recv().await {
                Some(outcome) => self.handle_acquired(outcome),
                None => break,
            }
        }
    }
}

async fn acquire(
    provider: Arc<dyn SourceProvider>,
    request: Acquisition,
) -> Result<Acquired, AcquireError> {
    let source = match request {
        Acquisition::Screen => provider.acquire_screen().await?,
        Acquisition::Camera(id) => provider.acquire_camera(Some(id)).await?,
        Acquisition::AnyCamera => {
            let source = provider.acquire_camera(None).await?;
            let cameras = match provider.enumerate_video_inputs().await {
                Ok(cameras) => cameras,
                Err(e) => {
                    source.stop();
                    return Err(e);
                }
            };
            if cameras.len() > 1 {
                source.stop();
                return Ok(Acquired::ChooseCamera(cameras));
            }
            source
        }
    };

    if source.is_live() {
        Ok(Acquired::Ready(source))
    } else {
        Err(AcquireError::Stopped)
    }
}

/// Create command and status channels for the engine
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}
