//! Input events delivered by the host and single-pointer routing.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Where a pointer event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerSource {
    Mouse,
    /// A touch point, identified by the host's touch id.
    Touch(u64),
}

/// Pointer event type for unified mouse/touch handling.
///
/// Positions are in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        source: PointerSource,
        position: Point,
    },
    Move {
        source: PointerSource,
        position: Point,
    },
    Up {
        source: PointerSource,
    },
    Cancel {
        source: PointerSource,
    },
    /// The pointer left the surface.
    Leave {
        source: PointerSource,
    },
}

/// What the stroke tracker should do in response to a pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeAction {
    Begin(Point),
    Extend(Point),
    End,
}

/// Lets exactly one logical pointer drive the stroke tracker.
///
/// The first pointer to go down owns the gesture until any pointer goes up,
/// is cancelled or leaves the surface.
#[derive(Debug, Clone, Default)]
pub struct PointerRouter {
    owner: Option<PointerSource>,
}

impl PointerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pointer currently driving the gesture.
    pub fn owner(&self) -> Option<PointerSource> {
        self.owner
    }

    pub fn route(&mut self, event: PointerEvent) -> Option<StrokeAction> {
        match event {
            PointerEvent::Down { source, position } => {
                if self.owner.is_some() {
                    return None;
                }
                self.owner = Some(source);
                Some(StrokeAction::Begin(position))
            }
            PointerEvent::Move { source, position } => {
                (self.owner == Some(source)).then_some(StrokeAction::Extend(position))
            }
            PointerEvent::Up { .. } | PointerEvent::Cancel { .. } | PointerEvent::Leave { .. } => {
                self.owner.take().map(|_| StrokeAction::End)
            }
        }
    }
}

/// A key from the virtual (or physical) keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyInput {
    Char(char),
    Enter,
    Backspace,
}

impl KeyInput {
    /// Parse a key name as emitted by the keyboard layouts: a single
    /// character, `"\n"`, `"enter"`, `"space"` or `"backspace"`.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Some(if ch == '\n' {
                KeyInput::Enter
            } else {
                KeyInput::Char(ch)
            });
        }
        match name {
            "enter" => Some(KeyInput::Enter),
            "space" => Some(KeyInput::Char(' ')),
            "backspace" => Some(KeyInput::Backspace),
            _ => None,
        }
    }
}

/// Plain text dropped onto the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub text: String,
    pub position: Point,
}
