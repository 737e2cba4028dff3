//! Vertical content bounds of a raster, in zone units.

use serde::{Deserialize, Serialize};
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::surface::{SurfacePair, SurfaceSize};

/// Whether a pixel counts as background.
///
/// Both fully transparent pixels (never painted) and white pixels (eraser
/// ink, or a white-filled canvas) are blank.
pub fn is_blank(pixel: PremultipliedColorU8) -> bool {
    if pixel.alpha() == 0 {
        return true;
    }
    let color = pixel.demultiply();
    color.red() == 255 && color.green() == 255 && color.blue() == 255
}

/// Used vertical extent: first used zone and number of zones through the
/// last used one. A blank raster is `{0, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentBounds {
    pub offset_zone: u32,
    pub height_zone: u32,
}

impl ContentBounds {
    pub const BLANK: ContentBounds = ContentBounds {
        offset_zone: 0,
        height_zone: 0,
    };

    pub fn is_blank(&self) -> bool {
        self.height_zone == 0
    }

    /// Row range `[top, bottom)` covered by these zones.
    pub fn row_span(&self, zone_height: u32) -> (u32, u32) {
        let top = self.offset_zone * zone_height;
        (top, top + self.height_zone * zone_height)
    }
}

/// Scans a raster in horizontal bands of a fixed height.
#[derive(Debug, Clone, Copy)]
pub struct ZoneScanner {
    zone_height: u32,
}

impl ZoneScanner {
    pub fn new(zone_height: u32) -> Self {
        Self {
            zone_height: zone_height.max(1),
        }
    }

    /// Scanner with the zone geometry of a compose surface.
    pub fn for_size(size: SurfaceSize) -> Self {
        Self::new(size.zone_height())
    }

    pub fn zone_height(&self) -> u32 {
        self.zone_height
    }

    /// Compute the used zones of `pixmap`. Runs in O(width x height).
    pub fn scan(&self, pixmap: &Pixmap) -> ContentBounds {
        let width = pixmap.width() as usize;
        let height = pixmap.height();
        let pixels = pixmap.pixels();
        let zone_count = height.div_ceil(self.zone_height);

        let mut first = None;
        let mut last = None;
        for zone in 0..zone_count {
            let start = (zone * self.zone_height) as usize;
            let end = ((zone + 1) * self.zone_height).min(height) as usize;
            let used = pixels[start * width..end * width]
                .iter()
                .any(|&p| !is_blank(p));
            if used {
                first.get_or_insert(zone);
                last = Some(zone);
            }
        }

        match (first, last) {
            (Some(first), Some(last)) => ContentBounds {
                offset_zone: first,
                height_zone: last - first + 1,
            },
            _ => ContentBounds::BLANK,
        }
    }
}

/// Scan the committed (base) layer of a surface pair.
pub fn scan(surface: &SurfacePair) -> ContentBounds {
    ZoneScanner::for_size(surface.size()).scan(surface.base())
}
