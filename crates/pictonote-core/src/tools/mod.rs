//! Drawing tools and the pointer stroke tracker.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform,
};

use crate::effects::{Cue, SharedEffects};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
}

/// Available brush sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrushSize {
    Small,
    #[default]
    Large,
}

impl BrushSize {
    /// Stroke width in pixels.
    pub fn width(&self) -> f32 {
        match self {
            BrushSize::Small => 3.0,
            BrushSize::Large => 10.0,
        }
    }
}

/// The active tool and brush size. Replaced wholesale on every toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolState {
    pub tool: ToolKind,
    pub size: BrushSize,
}

impl ToolState {
    pub fn new(tool: ToolKind, size: BrushSize) -> Self {
        Self { tool, size }
    }

    pub fn with_tool(self, tool: ToolKind) -> Self {
        Self { tool, ..self }
    }

    pub fn with_size(self, size: BrushSize) -> Self {
        Self { size, ..self }
    }

    pub fn width(&self) -> f32 {
        self.size.width()
    }

    /// Ink colour. The eraser paints the background colour.
    pub fn color(&self) -> Color {
        match self.tool {
            ToolKind::Pencil => Color::BLACK,
            ToolKind::Eraser => Color::WHITE,
        }
    }

    fn paint(&self) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(self.color());
        paint.anti_alias = true;
        paint
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            width: self.width(),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        }
    }
}

/// Phase of the current gesture.
#[derive(Debug, Clone, Default)]
enum StrokePhase {
    #[default]
    Idle,
    Active {
        /// Last point painted.
        last: Point,
    },
}

/// Turns a pointer-down/move/up gesture into ink on a raster.
pub struct StrokeTracker {
    tool_state: ToolState,
    phase: StrokePhase,
    /// Points of the stroke in progress.
    points: Vec<Point>,
    effects: SharedEffects,
}

impl StrokeTracker {
    pub fn new(effects: SharedEffects) -> Self {
        Self {
            tool_state: ToolState::default(),
            phase: StrokePhase::Idle,
            points: Vec::new(),
            effects,
        }
    }

    pub fn tool_state(&self) -> ToolState {
        self.tool_state
    }

    /// Swap in a new tool state. Applies from the next painted segment.
    pub fn set_tool_state(&mut self, tool_state: ToolState) {
        self.tool_state = tool_state;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, StrokePhase::Active { .. })
    }

    /// Points of the stroke in progress (empty when idle).
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Start a stroke at `point` and paint a dot so single taps are visible.
    pub fn begin_stroke(&mut self, target: &mut Pixmap, point: Point) {
        self.points.clear();
        self.points.push(point);
        self.phase = StrokePhase::Active { last: point };
        self.paint_dot(target, point);
        self.effects.play(Cue::PenDown);
    }

    /// Paint a segment from the previous point to `point`. No-op when idle.
    pub fn extend_stroke(&mut self, target: &mut Pixmap, point: Point) {
        let StrokePhase::Active { last } = &mut self.phase else {
            return;
        };
        let from = *last;
        *last = point;
        self.points.push(point);
        if from == point {
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(from.x as f32, from.y as f32);
        pb.line_to(point.x as f32, point.y as f32);
        if let Some(path) = pb.finish() {
            target.stroke_path(
                &path,
                &self.tool_state.paint(),
                &self.tool_state.stroke(),
                Transform::identity(),
                None,
            );
        }
    }

    /// Finish the stroke in progress.
    pub fn end_stroke(&mut self) {
        if self.is_active() {
            log::debug!("stroke finished with {} points", self.points.len());
        }
        self.phase = StrokePhase::Idle;
        self.points.clear();
    }

    fn paint_dot(&self, target: &mut Pixmap, center: Point) {
        let radius = self.tool_state.width() / 2.0;
        if let Some(circle) = PathBuilder::from_circle(center.x as f32, center.y as f32, radius) {
            target.fill_path(
                &circle,
                &self.tool_state.paint(),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{RecordedEffects, no_effects};
    use std::rc::Rc;

    fn alpha_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).unwrap().alpha()
    }

    #[test]
    fn test_tool_state_widths_and_colors() {
        let state = ToolState::default();
        assert_eq!(state.tool, ToolKind::Pencil);
        assert_eq!(state.width(), 10.0);
        assert_eq!(state.with_size(BrushSize::Small).width(), 3.0);
        assert_eq!(state.with_tool(ToolKind::Eraser).color(), Color::WHITE);
    }

    #[test]
    fn test_tap_paints_dot() {
        let mut pixmap = Pixmap::new(50, 50).unwrap();
        let mut tracker = StrokeTracker::new(no_effects());

        tracker.begin_stroke(&mut pixmap, Point::new(25.0, 25.0));
        tracker.end_stroke();

        assert_eq!(alpha_at(&pixmap, 25, 25), 255);
        assert_eq!(alpha_at(&pixmap, 5, 5), 0);
    }

    #[test]
    fn test_extend_draws_segment() {
        let mut pixmap = Pixmap::new(100, 50).unwrap();
        let mut tracker = StrokeTracker::new(no_effects());

        tracker.begin_stroke(&mut pixmap, Point::new(10.0, 25.0));
        tracker.extend_stroke(&mut pixmap, Point::new(90.0, 25.0));
        tracker.end_stroke();

        assert_eq!(alpha_at(&pixmap, 50, 25), 255);
        assert_eq!(alpha_at(&pixmap, 50, 5), 0);
    }

    #[test]
    fn test_extend_without_begin_is_ignored() {
        let mut pixmap = Pixmap::new(100, 50).unwrap();
        let mut tracker = StrokeTracker::new(no_effects());

        tracker.extend_stroke(&mut pixmap, Point::new(50.0, 25.0));

        assert!(!tracker.is_active());
        assert!(pixmap.pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn test_end_stroke_stops_painting() {
        let mut pixmap = Pixmap::new(100, 50).unwrap();
        let mut tracker = StrokeTracker::new(no_effects());

        tracker.begin_stroke(&mut pixmap, Point::new(10.0, 10.0));
        tracker.end_stroke();
        tracker.extend_stroke(&mut pixmap, Point::new(90.0, 40.0));

        assert_eq!(alpha_at(&pixmap, 50, 25), 0);
        assert!(tracker.points().is_empty());
    }

    #[test]
    fn test_eraser_paints_white() {
        let mut pixmap = Pixmap::new(50, 50).unwrap();
        pixmap.fill(Color::BLACK);
        let mut tracker = StrokeTracker::new(no_effects());
        tracker.set_tool_state(ToolState::new(ToolKind::Eraser, BrushSize::Large));

        tracker.begin_stroke(&mut pixmap, Point::new(25.0, 25.0));

        let pixel = pixmap.pixel(25, 25).unwrap();
        assert_eq!((pixel.red(), pixel.green(), pixel.blue()), (255, 255, 255));
    }

    #[test]
    fn test_pen_down_cue() {
        let effects = Rc::new(RecordedEffects::new());
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        let mut tracker = StrokeTracker::new(effects.clone());

        tracker.begin_stroke(&mut pixmap, Point::new(10.0, 10.0));

        assert_eq!(effects.take(), vec![Cue::PenDown]);
    }
}
