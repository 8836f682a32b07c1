//! Input event data structures

use serde::{Deserialize, Serialize};

/// A single input event (keyboard or mouse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Timestamp in microseconds since the backend started
    #[serde(default)]
    pub timestamp_us: u64,

    /// The type of event
    pub event: EventType,
}

/// Type of input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventType {
    /// Key press event
    KeyPress(KeyEvent),

    /// Key release event
    KeyRelease(KeyEvent),

    /// Mouse button press
    MousePress(MouseButtonEvent),

    /// Mouse button release
    MouseRelease(MouseButtonEvent),

    /// Mouse movement
    MouseMove(MouseMoveEvent),
}

/// Keyboard event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Physical key name (e.g., "KeyS", "Digit1", "Equal", "Escape")
    pub code: String,

    /// Text the key produced, if any (e.g., "s", "1", "+")
    #[serde(default)]
    pub key: Option<String>,
}

/// Logical key as seen by the chord interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// A top-row digit key producing its digit
    Digit(u8),
    /// Any other key producing a single character
    Char(char),
    Other,
}

impl KeyEvent {
    #[cfg(test)]
    pub fn new(code: impl Into<String>, key: Option<&str>) -> Self {
        Self {
            code: code.into(),
            key: key.map(str::to_string),
        }
    }

    /// Event for a key that types `ch` on a US layout
    #[cfg(test)]
    pub fn typed(ch: char) -> Self {
        let code = match ch {
            '0'..='9' => format!("Digit{}", ch),
            'a'..='z' => format!("Key{}", ch.to_ascii_uppercase()),
            '+' | '=' => "Equal".to_string(),
            '-' => "Minus".to_string(),
            _ => "Unidentified".to_string(),
        };
        Self {
            code,
            key: Some(ch.to_string()),
        }
    }

    #[cfg(test)]
    pub fn escape() -> Self {
        Self::new("Escape", Some("Escape"))
    }

    /// Classify the event for chord handling
    pub fn key(&self) -> Key {
        if self.code == "Escape" || self.key.as_deref() == Some("Escape") {
            return Key::Escape;
        }

        let mut chars = self.key.as_deref().unwrap_or("").chars();
        let ch = match (chars.next(), chars.next()) {
            (Some(ch), None) => ch,
            _ => return Key::Other,
        };

        if self.code.starts_with("Digit") {
            if let Some(digit) = ch.to_digit(10) {
                return Key::Digit(digit as u8);
            }
        }
        Key::Char(ch)
    }
}

/// Keyboard modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

/// Modifier keys held during a mouse event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Shift => self.shift,
            Modifier::Control => self.control,
            Modifier::Alt => self.alt,
            Modifier::Meta => self.meta,
        }
    }

    #[cfg(test)]
    pub fn with(mut self, modifier: Modifier) -> Self {
        match modifier {
            Modifier::Shift => self.shift = true,
            Modifier::Control => self.control = true,
            Modifier::Alt => self.alt = true,
            Modifier::Meta => self.meta = true,
        }
        self
    }
}

/// Mouse button event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    /// Button identifier
    pub button: MouseButton,

    /// X coordinate in stage pixels
    pub x: f64,

    /// Y coordinate in stage pixels
    pub y: f64,

    /// Modifiers held at the time of the event
    #[serde(default)]
    pub modifiers: Modifiers,
}

/// Mouse button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

/// Mouse movement event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseMoveEvent {
    /// X coordinate
    pub x: f64,

    /// Y coordinate
    pub y: f64,
}
