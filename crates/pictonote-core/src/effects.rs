//! Side-effect cues (sounds, haptics) raised by the composition engine and
//! the transport.
//!
//! Components receive an [`Effects`] handle at construction instead of
//! reaching for a process-wide player, so tests and headless hosts can pass
//! [`NoEffects`].

use std::cell::RefCell;
use std::rc::Rc;

/// A user-perceivable cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// A key on the virtual keyboard produced input.
    Keypress,
    /// The message cursor moved up or down the log.
    Scroll,
    /// A pen stroke started.
    PenDown,
    /// A message left the transport.
    Sent,
    /// A message record arrived.
    Received,
}

/// Sink for cues.
pub trait Effects {
    fn play(&self, cue: Cue);
}

/// Discards every cue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl Effects for NoEffects {
    fn play(&self, _cue: Cue) {}
}

/// Shared effects handle.
pub type SharedEffects = Rc<dyn Effects>;

/// Shorthand for an effects handle that does nothing.
pub fn no_effects() -> SharedEffects {
    Rc::new(NoEffects)
}

/// Records every cue in order. Useful for hosts that batch cues per frame.
#[derive(Debug, Default)]
pub struct RecordedEffects {
    cues: RefCell<Vec<Cue>>,
}

impl RecordedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded cues.
    pub fn take(&self) -> Vec<Cue> {
        std::mem::take(&mut *self.cues.borrow_mut())
    }
}

impl Effects for RecordedEffects {
    fn play(&self, cue: Cue) {
        self.cues.borrow_mut().push(cue);
    }
}
