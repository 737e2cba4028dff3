//! The compose slot: one surface pair plus the tools that draw on it.

use std::rc::Rc;

use kurbo::Point;
use thiserror::Error;

use crate::bounds::{self, ContentBounds};
use crate::effects::SharedEffects;
use crate::export::{self, Authorship};
use crate::input::{DropEvent, KeyInput, PointerEvent, PointerRouter, StrokeAction};
use crate::message::{MessageRecord, UserContent};
use crate::surface::{SurfacePair, SurfaceSize};
use crate::text::{FontTypesetter, TextCursorEngine, Typeset};
use crate::tools::{StrokeTracker, ToolState};

/// Vertical offset applied to dropped text, below the pointer.
pub const DROP_OFFSET_Y: f64 = 10.0;

/// Composition errors.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid surface {width}x{height}: {reason}")]
    InvalidSurface {
        width: u32,
        height: u32,
        reason: &'static str,
    },
    #[error("Nothing to send: surface is blank")]
    EmptySurface,
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Font error: {0}")]
    Font(String),
}

/// Result type for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Owns the raster surface pair and routes host input to the stroke
/// tracker and text engine.
pub struct ComposeSlot {
    surface: SurfacePair,
    router: PointerRouter,
    strokes: StrokeTracker,
    text: TextCursorEngine,
}

impl ComposeSlot {
    /// Create a slot that renders text with the embedded font.
    pub fn new(size: SurfaceSize, effects: SharedEffects) -> ComposeResult<Self> {
        let typeset = FontTypesetter::embedded()?;
        Self::with_typeset(size, Rc::new(typeset), effects)
    }

    pub fn with_typeset(
        size: SurfaceSize,
        typeset: Rc<dyn Typeset>,
        effects: SharedEffects,
    ) -> ComposeResult<Self> {
        Ok(Self {
            surface: SurfacePair::new(size)?,
            router: PointerRouter::new(),
            strokes: StrokeTracker::new(effects.clone()),
            text: TextCursorEngine::new(typeset, effects),
        })
    }

    pub fn surface(&self) -> &SurfacePair {
        &self.surface
    }

    pub fn text(&self) -> &TextCursorEngine {
        &self.text
    }

    pub fn tool_state(&self) -> ToolState {
        self.strokes.tool_state()
    }

    pub fn set_tool_state(&mut self, tool_state: ToolState) {
        self.strokes.set_tool_state(tool_state);
    }

    pub fn is_drawing(&self) -> bool {
        self.strokes.is_active()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let Some(action) = self.router.route(event) else {
            return;
        };
        match action {
            StrokeAction::Begin(point) => self.strokes.begin_stroke(self.surface.base_mut(), point),
            StrokeAction::Extend(point) => {
                self.strokes.extend_stroke(self.surface.base_mut(), point)
            }
            StrokeAction::End => self.strokes.end_stroke(),
        }
    }

    pub fn handle_key(&mut self, key: KeyInput) {
        self.text.push_key(&mut self.surface, key);
    }

    /// Type every character of `text`, treating `'\n'` as Enter.
    pub fn type_text(&mut self, text: &str) {
        for ch in text.chars() {
            let key = if ch == '\n' {
                KeyInput::Enter
            } else {
                KeyInput::Char(ch)
            };
            self.handle_key(key);
        }
    }

    /// Place dropped text centred on the pointer, just below it.
    pub fn drop_text(&mut self, event: &DropEvent) {
        let width = self.text.measure(&event.text);
        let anchor = Point::new(
            event.position.x - width / 2.0,
            event.position.y + DROP_OFFSET_Y,
        );
        self.text
            .insert_at(&mut self.surface, &event.text, anchor.x, anchor.y);
    }

    /// Composite pending text onto the base layer.
    pub fn commit_text(&mut self) {
        self.text.commit(&mut self.surface, None);
    }

    /// Wipe both layers and the text buffer.
    pub fn clear(&mut self) {
        self.router = PointerRouter::new();
        self.strokes.end_stroke();
        self.surface.clear_base();
        self.text.clear(&mut self.surface);
    }

    /// Used zones of the committed layer.
    pub fn bounds(&self) -> ContentBounds {
        bounds::scan(&self.surface)
    }

    /// Commit text, serialize the used zones and reset the slot.
    ///
    /// Returns `Ok(None)` without touching the serializer when there is
    /// nothing on the surface.
    pub fn send(&mut self, authorship: &Authorship) -> ComposeResult<Option<UserContent>> {
        self.router = PointerRouter::new();
        self.strokes.end_stroke();
        self.commit_text();

        let bounds = self.bounds();
        if bounds.is_blank() {
            log::debug!("send skipped: compose surface is blank");
            return Ok(None);
        }

        let content = export::serialize(&self.surface, bounds, authorship)?;
        self.clear();
        Ok(Some(content))
    }

    /// Replace the surface contents with a received user message.
    ///
    /// Returns `Ok(false)` for records that carry no raster.
    pub fn copy_from(&mut self, record: &MessageRecord) -> ComposeResult<bool> {
        let Some(content) = record.user_content() else {
            return Ok(false);
        };
        let image = export::decode_data_uri(&content.img)?;
        self.clear();
        self.surface.draw_onto_base(image.as_ref(), 0, 0);
        log::debug!(
            "copied {}x{} message from {}",
            image.width(),
            image.height(),
            content.author
        );
        Ok(true)
    }
}
