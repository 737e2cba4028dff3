//! The raster surface pair backing one compose slot.
//!
//! The *base* layer holds committed ink (strokes and committed text). The
//! *overlay* layer holds text that is still being typed; it is composited
//! onto the base on commit and otherwise discarded.

use serde::{Deserialize, Serialize};
use tiny_skia::{Color, Pixmap, PixmapPaint, PixmapRef, Transform};

use crate::compose::{ComposeError, ComposeResult};

/// Number of horizontal bands the surface height is split into.
pub const ZONE_COUNT: u32 = 5;

/// Pixel dimensions of a compose surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 400,
            height: 180,
        }
    }
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zones must be whole rows, so the height has to divide evenly.
    pub fn validate(&self) -> ComposeResult<()> {
        let reason = if self.width == 0 || self.height == 0 {
            "dimensions must be non-zero"
        } else if self.height % ZONE_COUNT != 0 {
            "height must be a multiple of the zone count"
        } else {
            return Ok(());
        };
        Err(ComposeError::InvalidSurface {
            width: self.width,
            height: self.height,
            reason,
        })
    }

    /// Rows per zone.
    pub fn zone_height(&self) -> u32 {
        self.height / ZONE_COUNT
    }

    /// Vertical advance for one line of text.
    pub fn line_height(&self) -> f64 {
        self.zone_height() as f64
    }
}

/// Base + overlay pixel buffers of identical size.
pub struct SurfacePair {
    size: SurfaceSize,
    base: Pixmap,
    overlay: Pixmap,
}

impl SurfacePair {
    /// Create a blank (fully transparent) pair.
    pub fn new(size: SurfaceSize) -> ComposeResult<Self> {
        size.validate()?;
        let base = new_pixmap(size.width, size.height)?;
        let overlay = new_pixmap(size.width, size.height)?;
        Ok(Self {
            size,
            base,
            overlay,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn base(&self) -> &Pixmap {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Pixmap {
        &mut self.base
    }

    pub fn overlay(&self) -> &Pixmap {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Pixmap {
        &mut self.overlay
    }

    pub fn clear_base(&mut self) {
        self.base.fill(Color::TRANSPARENT);
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.fill(Color::TRANSPARENT);
    }

    /// Copy overlay pixels onto the base (source-over), then blank the overlay.
    pub fn composite_overlay(&mut self) {
        self.base.draw_pixmap(
            0,
            0,
            self.overlay.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        self.clear_overlay();
    }

    /// Draw an external raster onto the base at `(x, y)`.
    pub fn draw_onto_base(&mut self, image: PixmapRef<'_>, x: i32, y: i32) {
        self.base.draw_pixmap(
            x,
            y,
            image,
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

pub(crate) fn new_pixmap(width: u32, height: u32) -> ComposeResult<Pixmap> {
    Pixmap::new(width, height).ok_or(ComposeError::InvalidSurface {
        width,
        height,
        reason: "pixel buffer could not be allocated",
    })
}
