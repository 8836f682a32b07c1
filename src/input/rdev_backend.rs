//! rdev-based input capture backend
//! Works on Windows, macOS, and Linux (X11)
//!
//! The hook is global: pointer coordinates are screen coordinates, so the
//! stage is assumed to sit at the screen origin.

use crate::input::{
    EventType, InputBackend, InputEvent, KeyEvent, Modifiers, MouseButton, MouseButtonEvent,
    MouseMoveEvent,
};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// rdev-based input capture backend
pub struct RdevBackend {
    capturing: Arc<AtomicBool>,
}

impl RdevBackend {
    /// Create a new rdev backend
    pub fn new() -> Self {
        Self {
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for RdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Modifier and pointer state rdev does not carry on each event
#[derive(Debug, Default)]
struct HookState {
    modifiers: Modifiers,
    x: f64,
    y: f64,
}

impl HookState {
    fn track_modifier(&mut self, key: rdev::Key, down: bool) {
        match key {
            rdev::Key::ShiftLeft | rdev::Key::ShiftRight => self.modifiers.shift = down,
            rdev::Key::ControlLeft | rdev::Key::ControlRight => self.modifiers.control = down,
            rdev::Key::Alt | rdev::Key::AltGr => self.modifiers.alt = down,
            rdev::Key::MetaLeft | rdev::Key::MetaRight => self.modifiers.meta = down,
            _ => {}
        }
    }

    fn translate(&mut self, event_type: rdev::EventType) -> Option<EventType> {
        match event_type {
            rdev::EventType::KeyPress(key) => {
                self.track_modifier(key, true);
                Some(EventType::KeyPress(key_event(key, self.modifiers.shift)))
            }
            rdev::EventType::KeyRelease(key) => {
                let event = key_event(key, self.modifiers.shift);
                self.track_modifier(key, false);
                Some(EventType::KeyRelease(event))
            }
            rdev::EventType::ButtonPress(button) => Some(EventType::MousePress(MouseButtonEvent {
                button: MouseButton::from(button),
                x: self.x,
                y: self.y,
                modifiers: self.modifiers,
            })),
            rdev::EventType::ButtonRelease(button) => {
                Some(EventType::MouseRelease(MouseButtonEvent {
                    button: MouseButton::from(button),
                    x: self.x,
                    y: self.y,
                    modifiers: self.modifiers,
                }))
            }
            rdev::EventType::MouseMove { x, y } => {
                self.x = x;
                self.y = y;
                Some(EventType::MouseMove(MouseMoveEvent { x, y }))
            }
            rdev::EventType::Wheel { .. } => None,
        }
    }
}

impl InputBackend for RdevBackend {
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()> {
        if self.capturing.load(Ordering::SeqCst) {
            return Ok(()); // Already capturing
        }

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = self.capturing.clone();
        let start_time = Instant::now();

        thread::spawn(move || {
            info!("rdev input capture started");

            let mut state = HookState::default();
            let callback = move |event: rdev::Event| {
                if !capturing.load(Ordering::SeqCst) {
                    return;
                }

                let Some(event_type) = state.translate(event.event_type) else {
                    return;
                };

                let input_event = InputEvent {
                    timestamp_us: start_time.elapsed().as_micros() as u64,
                    event: event_type,
                };

                if let Err(e) = tx.send(input_event) {
                    debug!("Failed to send input event: {}", e);
                }
            };

            // Run the event listener
            if let Err(e) = rdev::listen(callback) {
                error!("rdev listen error: {:?}", e);
            }

            info!("rdev input capture stopped");
        });

        Ok(())
    }
}

impl Drop for RdevBackend {
    fn drop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }
}

/// Map an rdev key to a DOM-style code plus the text it types on a US layout
fn key_event(key: rdev::Key, shift: bool) -> KeyEvent {
    use rdev::Key::*;

    let digit = |n: u8| -> (String, Option<String>) {
        let text = if shift { None } else { Some(n.to_string()) };
        (format!("Digit{}", n), text)
    };
    let letter = |c: char| -> (String, Option<String>) {
        let text = if shift { c.to_ascii_uppercase() } else { c };
        (format!("Key{}", c.to_ascii_uppercase()), Some(text.to_string()))
    };
    let numpad = |n: u8| (format!("Numpad{}", n), Some(n.to_string()));

    let (code, text) = match key {
        Escape => ("Escape".to_string(), Some("Escape".to_string())),
        Num0 => digit(0),
        Num1 => digit(1),
        Num2 => digit(2),
        Num3 => digit(3),
        Num4 => digit(4),
        Num5 => digit(5),
        Num6 => digit(6),
        Num7 => digit(7),
        Num8 => digit(8),
        Num9 => digit(9),
        Kp0 => numpad(0),
        Kp1 => numpad(1),
        Kp2 => numpad(2),
        Kp3 => numpad(3),
        Kp4 => numpad(4),
        Kp5 => numpad(5),
        Kp6 => numpad(6),
        Kp7 => numpad(7),
        Kp8 => numpad(8),
        Kp9 => numpad(9),
        KeyA => letter('a'),
        KeyB => letter('b'),
        KeyC => letter('c'),
        KeyD => letter('d'),
        KeyE => letter('e'),
        KeyF => letter('f'),
        KeyG => letter('g'),
        KeyH => letter('h'),
        KeyI => letter('i'),
        KeyJ => letter('j'),
        KeyK => letter('k'),
        KeyL => letter('l'),
        KeyM => letter('m'),
        KeyN => letter('n'),
        KeyO => letter('o'),
        KeyP => letter('p'),
        KeyQ => letter('q'),
        KeyR => letter('r'),
        KeyS => letter('s'),
        KeyT => letter('t'),
        KeyU => letter('u'),
        KeyV => letter('v'),
        KeyW => letter('w'),
        KeyX => letter('x'),
        KeyY => letter('y'),
        KeyZ => letter('z'),
        Equal => (
            "Equal".to_string(),
            Some((if shift { "+" } else { "=" }).to_string()),
        ),
        Minus => (
            "Minus".to_string(),
            Some((if shift { "_" } else { "-" }).to_string()),
        ),
        KpPlus => ("NumpadAdd".to_string(), Some("+".to_string())),
        KpMinus => ("NumpadSubtract".to_string(), Some("-".to_string())),
        other => (format!("{:?}", other), None),
    };

    KeyEvent { code, key: text }
}

impl From<rdev::Button> for MouseButton {
    fn from(button: rdev::Button) -> Self {
        match button {
            rdev::Button::Left => MouseButton::Left,
            rdev::Button::Right => MouseButton::Right,
            rdev::Button::Middle => MouseButton::Middle,
            rdev::Button::Unknown(n) => MouseButton::Other(n),
        }
    }
}
