//! Text cursor engine: an append-only character buffer laid out onto the
//! overlay layer.
//!
//! Typed text lives on the overlay until it is committed, at which point it
//! is composited onto the base layer and becomes part of the message raster.
//! Clearing (or dropping the compose slot) before a commit discards it.

use std::rc::Rc;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont, point};
use kurbo::Point;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::compose::{ComposeError, ComposeResult};
use crate::effects::{Cue, SharedEffects};
use crate::input::KeyInput;
use crate::surface::SurfacePair;

static DEJAVU_SANS: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Where typing starts after a clear or an undirected commit.
pub const DEFAULT_ANCHOR: Point = Point::new(105.0, 25.0);

/// X position a wrapped or broken line restarts from.
pub const LEFT_MARGIN: f64 = 5.0;

/// Nominal glyph size in pixels.
pub const FONT_SIZE: f32 = 20.0;

/// One element of the text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextItem {
    Glyph(char),
    Newline,
}

impl From<char> for TextItem {
    fn from(ch: char) -> Self {
        if ch == '\n' {
            TextItem::Newline
        } else {
            TextItem::Glyph(ch)
        }
    }
}

/// A glyph positioned by layout. `origin` is the left end of its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub origin: Point,
    pub advance: f64,
}

/// Measures and draws glyphs.
pub trait Typeset {
    /// Horizontal advance of `ch` in pixels.
    fn advance(&self, ch: char) -> f64;

    /// Rasterize one placed glyph onto `target`.
    fn draw(&self, target: &mut Pixmap, glyph: &PlacedGlyph);
}

/// Geometry the layout pass needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub anchor: Point,
    pub left_margin: f64,
    /// Glyphs may not extend past this x.
    pub right_edge: f64,
    pub line_height: f64,
}

/// Lay out `items` left to right from the anchor, wrapping at the right edge.
pub fn layout(items: &[TextItem], params: &LayoutParams, typeset: &dyn Typeset) -> Vec<PlacedGlyph> {
    let mut pen = params.anchor;
    let mut placed = Vec::with_capacity(items.len());

    for item in items {
        match *item {
            TextItem::Newline => {
                pen.x = params.left_margin;
                pen.y += params.line_height;
            }
            TextItem::Glyph(ch) => {
                let advance = typeset.advance(ch);
                if pen.x + advance > params.right_edge {
                    pen.x = params.left_margin;
                    pen.y += params.line_height;
                }
                placed.push(PlacedGlyph {
                    ch,
                    origin: pen,
                    advance,
                });
                pen.x += advance;
            }
        }
    }

    placed
}

/// Glyph rasterizer backed by the embedded DejaVu Sans face.
pub struct FontTypesetter {
    font: FontRef<'static>,
    scale: PxScale,
}

impl FontTypesetter {
    pub fn embedded() -> ComposeResult<Self> {
        let font = FontRef::try_from_slice(DEJAVU_SANS)
            .map_err(|e| ComposeError::Font(e.to_string()))?;
        Ok(Self {
            font,
            scale: PxScale::from(FONT_SIZE),
        })
    }
}

impl Typeset for FontTypesetter {
    fn advance(&self, ch: char) -> f64 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.h_advance(self.font.glyph_id(ch)) as f64
    }

    fn draw(&self, target: &mut Pixmap, glyph: &PlacedGlyph) {
        let positioned = self.font.glyph_id(glyph.ch).with_scale_and_position(
            self.scale,
            point(glyph.origin.x as f32, glyph.origin.y as f32),
        );
        let Some(outlined) = self.font.outline_glyph(positioned) else {
            // Whitespace and glyphs missing from the face have no outline.
            return;
        };

        let bounds = outlined.px_bounds();
        let width = target.width() as i64;
        let height = target.height() as i64;
        let pixels = target.pixels_mut();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + gx as i64;
            let y = bounds.min.y as i64 + gy as i64;
            if x < 0 || y < 0 || x >= width || y >= height {
                return;
            }
            let index = (y * width + x) as usize;
            pixels[index] = blend_black(pixels[index], coverage);
        });
    }
}

/// Source-over of opaque black at `coverage` onto a premultiplied pixel.
fn blend_black(dst: PremultipliedColorU8, coverage: f32) -> PremultipliedColorU8 {
    let c = coverage.clamp(0.0, 1.0);
    let keep = 1.0 - c;
    let scale = |v: u8| (v as f32 * keep).round() as u8;
    let alpha = (255.0 * c + dst.alpha() as f32 * keep).round().min(255.0) as u8;
    PremultipliedColorU8::from_rgba(scale(dst.red()), scale(dst.green()), scale(dst.blue()), alpha)
        .unwrap_or(dst)
}

/// Owns the text buffer and anchor of one compose slot.
pub struct TextCursorEngine {
    items: Vec<TextItem>,
    anchor: Point,
    /// Drop point of the last `insert_at`, reused by the next plain commit.
    drop_point: Option<Point>,
    glyphs: Vec<PlacedGlyph>,
    typeset: Rc<dyn Typeset>,
    effects: SharedEffects,
}

impl TextCursorEngine {
    pub fn new(typeset: Rc<dyn Typeset>, effects: SharedEffects) -> Self {
        Self {
            items: Vec::new(),
            anchor: DEFAULT_ANCHOR,
            drop_point: None,
            glyphs: Vec::new(),
            typeset,
            effects,
        }
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn items(&self) -> &[TextItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Buffer contents with newlines as `'\n'`.
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|item| match item {
                TextItem::Glyph(ch) => *ch,
                TextItem::Newline => '\n',
            })
            .collect()
    }

    /// Glyph placements from the last layout pass.
    pub fn glyphs(&self) -> &[PlacedGlyph] {
        &self.glyphs
    }

    /// Apply one keyboard key.
    pub fn push_key(&mut self, surface: &mut SurfacePair, key: KeyInput) {
        self.effects.play(Cue::Keypress);
        match key {
            KeyInput::Char(ch) => self.append_char(surface, ch),
            KeyInput::Enter => self.append_char(surface, '\n'),
            KeyInput::Backspace => self.backspace(surface),
        }
    }

    pub fn append_char(&mut self, surface: &mut SurfacePair, ch: char) {
        self.items.push(TextItem::from(ch));
        self.render(surface);
    }

    pub fn backspace(&mut self, surface: &mut SurfacePair) {
        if self.items.pop().is_some() {
            self.render(surface);
        }
    }

    /// Composite typed text onto the base, then start over at `drop`.
    ///
    /// Without an explicit drop the next cycle starts at the point of the
    /// last `insert_at`, or at the default anchor if there was none.
    pub fn commit(&mut self, surface: &mut SurfacePair, drop: Option<Point>) {
        surface.composite_overlay();
        self.items.clear();
        self.glyphs.clear();
        self.anchor = drop.or(self.drop_point.take()).unwrap_or(DEFAULT_ANCHOR);
    }

    /// Discard typed text without compositing it.
    pub fn clear(&mut self, surface: &mut SurfacePair) {
        surface.clear_overlay();
        self.items.clear();
        self.glyphs.clear();
        self.anchor = DEFAULT_ANCHOR;
        self.drop_point = None;
    }

    /// Commit pending text, move the anchor to `(x, y)` and type `text` there.
    pub fn insert_at(&mut self, surface: &mut SurfacePair, text: &str, x: f64, y: f64) {
        let point = Point::new(x, y);
        self.commit(surface, Some(point));
        self.drop_point = Some(point);
        for ch in text.chars() {
            self.append_char(surface, ch);
        }
    }

    /// Width of `text` on a single line.
    pub fn measure(&self, text: &str) -> f64 {
        text.chars().map(|ch| self.typeset.advance(ch)).sum()
    }

    fn render(&mut self, surface: &mut SurfacePair) {
        let size = surface.size();
        let params = LayoutParams {
            anchor: self.anchor,
            left_margin: LEFT_MARGIN,
            right_edge: size.width as f64,
            line_height: size.line_height(),
        };
        self.glyphs = layout(&self.items, &params, self.typeset.as_ref());

        surface.clear_overlay();
        let overlay = surface.overlay_mut();
        for glyph in &self.glyphs {
            self.typeset.draw(overlay, glyph);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bounds::ZoneScanner;
    use crate::effects::no_effects;
    use crate::surface::SurfaceSize;
    use tiny_skia::{Color, Paint, Rect, Transform};

    /// Fixed-advance typesetter that draws each glyph as a solid block.
    pub(crate) struct BlockTypeset {
        pub advance: f64,
    }

    impl Typeset for BlockTypeset {
        fn advance(&self, _ch: char) -> f64 {
            self.advance
        }

        fn draw(&self, target: &mut Pixmap, glyph: &PlacedGlyph) {
            if glyph.ch == ' ' {
                return;
            }
            let mut paint = Paint::default();
            paint.set_color(Color::BLACK);
            let top = (glyph.origin.y - 12.0) as f32;
            let left = glyph.origin.x as f32;
            if let Some(rect) = Rect::from_xywh(left, top, (self.advance - 2.0) as f32, 12.0) {
                target.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
    }

    fn engine(advance: f64) -> TextCursorEngine {
        TextCursorEngine::new(Rc::new(BlockTypeset { advance }), no_effects())
    }

    fn surface() -> SurfacePair {
        SurfacePair::new(SurfaceSize::default()).unwrap()
    }

    #[test]
    fn test_layout_wraps_to_left_margin() {
        let params = LayoutParams {
            anchor: Point::new(105.0, 25.0),
            left_margin: LEFT_MARGIN,
            right_edge: 200.0,
            line_height: 36.0,
        };
        let items: Vec<TextItem> = "abcdefghij".chars().map(TextItem::from).collect();
        let placed = layout(&items, &params, &BlockTypeset { advance: 20.0 });

        // 105, 125, 145, 165 fit; 185 + 20 > 200 wraps.
        assert_eq!(placed[3].origin, Point::new(165.0, 25.0));
        assert_eq!(placed[4].origin, Point::new(LEFT_MARGIN, 61.0));
        assert_eq!(placed[4].origin.y - placed[3].origin.y, params.line_height);
        assert_eq!(placed[5].origin, Point::new(25.0, 61.0));
    }

    #[test]
    fn test_layout_newline() {
        let params = LayoutParams {
            anchor: Point::new(50.0, 20.0),
            left_margin: LEFT_MARGIN,
            right_edge: 400.0,
            line_height: 36.0,
        };
        let items = [TextItem::Glyph('a'), TextItem::Newline, TextItem::Glyph('b')];
        let placed = layout(&items, &params, &BlockTypeset { advance: 10.0 });

        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].origin, Point::new(LEFT_MARGIN, 56.0));
    }

    #[test]
    fn test_typing_stays_on_overlay() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.append_char(&mut surface, 'h');
        text.append_char(&mut surface, 'i');

        let scanner = ZoneScanner::for_size(surface.size());
        assert!(scanner.scan(surface.base()).is_blank());
        assert!(!scanner.scan(surface.overlay()).is_blank());
        assert_eq!(text.text(), "hi");
    }

    #[test]
    fn test_backspace_relays_out() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.append_char(&mut surface, 'a');
        text.backspace(&mut surface);
        text.backspace(&mut surface);

        assert!(text.is_empty());
        assert!(text.glyphs().is_empty());
        let scanner = ZoneScanner::for_size(surface.size());
        assert!(scanner.scan(surface.overlay()).is_blank());
    }

    #[test]
    fn test_commit_composites_and_resets_anchor() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.append_char(&mut surface, 'x');
        text.commit(&mut surface, None);

        let scanner = ZoneScanner::for_size(surface.size());
        assert!(!scanner.scan(surface.base()).is_blank());
        assert!(scanner.scan(surface.overlay()).is_blank());
        assert!(text.is_empty());
        assert_eq!(text.anchor(), DEFAULT_ANCHOR);
    }

    #[test]
    fn test_commit_with_drop_point() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.commit(&mut surface, Some(Point::new(10.0, 100.0)));
        assert_eq!(text.anchor(), Point::new(10.0, 100.0));
    }

    #[test]
    fn test_insert_at_places_first_glyph_at_drop_point() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.append_char(&mut surface, 'q');
        text.insert_at(&mut surface, "A", 50.0, 80.0);

        assert_eq!(text.anchor(), Point::new(50.0, 80.0));
        assert_eq!(text.glyphs()[0].origin, Point::new(50.0, 80.0));
        assert_eq!(text.text(), "A");
        // The earlier 'q' was committed, not discarded.
        assert!(!ZoneScanner::for_size(surface.size()).scan(surface.base()).is_blank());
    }

    #[test]
    fn test_drop_point_survives_commit_until_clear() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.insert_at(&mut surface, "A", 50.0, 80.0);
        text.commit(&mut surface, None);
        assert_eq!(text.anchor(), Point::new(50.0, 80.0));

        text.clear(&mut surface);
        assert_eq!(text.anchor(), DEFAULT_ANCHOR);

        // Only one cycle inherits the drop point.
        text.insert_at(&mut surface, "B", 20.0, 30.0);
        text.commit(&mut surface, None);
        text.commit(&mut surface, None);
        assert_eq!(text.anchor(), DEFAULT_ANCHOR);
    }

    #[test]
    fn test_clear_discards_text() {
        let mut surface = surface();
        let mut text = engine(12.0);

        text.append_char(&mut surface, 'z');
        text.clear(&mut surface);

        let scanner = ZoneScanner::for_size(surface.size());
        assert!(scanner.scan(surface.overlay()).is_blank());
        assert!(scanner.scan(surface.base()).is_blank());
    }

    #[test]
    fn test_font_typesetter_renders_ink() {
        let typeset = FontTypesetter::embedded().unwrap();
        assert!(typeset.advance('W') > typeset.advance('i'));
        assert!(typeset.advance('W') > 0.0);

        let mut pixmap = Pixmap::new(40, 40).unwrap();
        typeset.draw(
            &mut pixmap,
            &PlacedGlyph {
                ch: 'M',
                origin: Point::new(5.0, 30.0),
                advance: typeset.advance('M'),
            },
        );
        assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));
    }

    #[test]
    fn test_blend_black_over_transparent() {
        let out = blend_black(PremultipliedColorU8::TRANSPARENT, 1.0);
        assert_eq!((out.red(), out.alpha()), (0, 255));
        let half = blend_black(PremultipliedColorU8::TRANSPARENT, 0.5);
        assert_eq!(half.alpha(), 128);
    }
}
