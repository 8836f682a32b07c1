//! Two-key chord interpreter
//!
//! Keyups drive a small state machine. [`transition`] is the pure table;
//! [`ChordInterpreter`] wraps it with the one-shot camera choice, which gets
//! first look at a keyup whenever it is armed.

use tracing::debug;

use super::events::Key;
use crate::source::DeviceInfo;

/// Partially entered chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChordState {
    #[default]
    Idle,
    PendingPlus,
    PendingZero,
    PendingMinus,
}

/// High-level command produced by a completed chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddScreen,
    AddCamera,
    RemoveAll,
    /// Bring the n-th item by ascending slot (1-based) to the front
    BringToFront(usize),
    /// Acquire the camera picked from the choice prompt
    UseCamera(DeviceInfo),
}

/// Status line indicator for the chord state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Plus,
    Minus,
    EmptySet,
    Clear,
}

impl Indicator {
    pub fn text(self) -> &'static str {
        match self {
            Indicator::Plus => "+",
            Indicator::Minus => "-",
            Indicator::EmptySet => "\u{2205}",
            Indicator::Clear => "",
        }
    }
}

/// Result of feeding one key to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ChordState,
    pub command: Option<Command>,
    pub indicator: Option<Indicator>,
}

impl Transition {
    fn to(state: ChordState, indicator: Indicator) -> Self {
        Self {
            state,
            command: None,
            indicator: Some(indicator),
        }
    }

    fn complete(command: Command) -> Self {
        Self {
            state: ChordState::Idle,
            command: Some(command),
            indicator: Some(Indicator::Clear),
        }
    }

    fn stay(state: ChordState) -> Self {
        Self {
            state,
            command: None,
            indicator: None,
        }
    }
}

/// The chord transition table.
///
/// Keys with no entry leave the state untouched, including while a chord is
/// pending: `+` then `x` keeps waiting for `s` or `c`.
pub fn transition(state: ChordState, key: Key) -> Transition {
    use ChordState::*;

    match (state, key) {
        (_, Key::Escape) => Transition::to(Idle, Indicator::Clear),
        (Idle, Key::Char('+')) => Transition::to(PendingPlus, Indicator::Plus),
        (PendingPlus, Key::Char('s')) => Transition::complete(Command::AddScreen),
        (PendingPlus, Key::Char('c')) => Transition::complete(Command::AddCamera),
        (Idle, Key::Char('-')) => Transition::to(PendingMinus, Indicator::Minus),
        (Idle, Key::Char('0') | Key::Digit(0)) => Transition::to(PendingZero, Indicator::EmptySet),
        (PendingZero, Key::Char('0') | Key::Digit(0)) => Transition::complete(Command::RemoveAll),
        (Idle, Key::Digit(n)) => Transition {
            state: Idle,
            command: Some(Command::BringToFront(usize::from(n))),
            indicator: None,
        },
        (state, _) => Transition::stay(state),
    }
}

/// What the engine should do after a keyup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reaction {
    pub command: Option<Command>,
    /// New status line text, if it changes
    pub message: Option<String>,
}

/// Chord state plus the optional pending camera choice
#[derive(Debug, Default)]
pub struct ChordInterpreter {
    state: ChordState,
    camera_choice: Option<Vec<DeviceInfo>>,
}

impl ChordInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> ChordState {
        self.state
    }

    #[cfg(test)]
    pub fn is_choosing_camera(&self) -> bool {
        self.camera_choice.is_some()
    }

    /// Feed one keyup
    pub fn on_key(&mut self, key: Key) -> Reaction {
        if let Some(cameras) = self.camera_choice.take() {
            return Self::resolve_camera_choice(&cameras, key);
        }

        let t = transition(self.state, key);
        if t.state != self.state {
            debug!("Chord state {:?} -> {:?}", self.state, t.state);
        }
        self.state = t.state;
        Reaction {
            command: t.command,
            message: t.indicator.map(|i| i.text().to_string()),
        }
    }

    fn resolve_camera_choice(cameras: &[DeviceInfo], key: Key) -> Reaction {
        let command = match key {
            Key::Digit(n) if n >= 1 => cameras
                .get(usize::from(n) - 1)
                .cloned()
                .map(Command::UseCamera),
            _ => None,
        };
        if command.is_none() {
            debug!("Camera choice dismissed by {:?}", key);
        }
        Reaction {
            command,
            message: Some(String::new()),
        }
    }

    /// Arm the one-shot camera choice and return the prompt to show
    pub fn arm_camera_choice(&mut self, cameras: Vec<DeviceInfo>) -> String {
        let prompt = camera_prompt(&cameras);
        self.camera_choice = Some(cameras);
        prompt
    }

    /// Consume a pending remove, if any. Returns true when the click should
    /// remove whatever it landed on.
    pub fn take_remove_click(&mut self) -> bool {
        if self.state == ChordState::PendingMinus {
            self.state = ChordState::Idle;
            true
        } else {
            false
        }
    }
}

/// Numbered list of camera labels, one per line
pub fn camera_prompt(cameras: &[DeviceInfo]) -> String {
    cameras
        .iter()
        .enumerate()
        .map(|(i, cam)| {
            let label = cam.label.strip_suffix(" Camera").unwrap_or(&cam.label);
            format!("{}) {}", i + 1, label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
