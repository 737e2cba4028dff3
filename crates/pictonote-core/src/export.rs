//! Cropping, PNG encoding and data-URI wrapping of the compose raster.

use base64::{Engine, engine::general_purpose::STANDARD};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::bounds::ContentBounds;
use crate::compose::{ComposeError, ComposeResult};
use crate::message::UserContent;
use crate::palette::Swatch;
use crate::surface::{SurfacePair, new_pixmap};

/// Prefix of every image carried in a user message.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Who a serialized message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorship {
    pub author: String,
    pub color: Swatch,
}

/// Cut the used zones out of `source`.
pub fn crop(source: &Pixmap, bounds: ContentBounds, zone_height: u32) -> ComposeResult<Pixmap> {
    if bounds.is_blank() {
        return Err(ComposeError::EmptySurface);
    }
    let (top, bottom) = bounds.row_span(zone_height);
    let bottom = bottom.min(source.height());
    if top >= bottom {
        return Err(ComposeError::EmptySurface);
    }

    let mut cropped = new_pixmap(source.width(), bottom - top)?;
    cropped.draw_pixmap(
        0,
        -(top as i32),
        source.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(cropped)
}

/// Encode a raster as 8-bit RGBA PNG.
pub fn encode_png(pixmap: &Pixmap) -> ComposeResult<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }

    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| ComposeError::Encode(e.to_string()))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| ComposeError::Encode(e.to_string()))?;
    }
    Ok(png_data)
}

pub fn to_data_uri(png_data: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URI_PREFIX, STANDARD.encode(png_data))
}

/// The PNG bytes inside a `data:image/png;base64,...` URI.
pub fn data_uri_bytes(uri: &str) -> ComposeResult<Vec<u8>> {
    let payload = uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or_else(|| ComposeError::Decode("not a base64 PNG data URI".to_string()))?;
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ComposeError::Decode(e.to_string()))
}

/// Decode a `data:image/png;base64,...` URI back into a raster.
pub fn decode_data_uri(uri: &str) -> ComposeResult<Pixmap> {
    let bytes = data_uri_bytes(uri)?;
    Pixmap::decode_png(&bytes).map_err(|e| ComposeError::Decode(e.to_string()))
}

/// Crop the base layer to `bounds`, encode it and attribute it.
pub fn serialize(
    surface: &SurfacePair,
    bounds: ContentBounds,
    authorship: &Authorship,
) -> ComposeResult<UserContent> {
    let cropped = crop(surface.base(), bounds, surface.size().zone_height())?;
    let png_data = encode_png(&cropped)?;
    log::debug!(
        "serialized {}x{} crop (zones {}+{}) into {} PNG bytes",
        cropped.width(),
        cropped.height(),
        bounds.offset_zone,
        bounds.height_zone,
        png_data.len()
    );
    Ok(UserContent {
        author: authorship.author.clone(),
        color: authorship.color,
        img: to_data_uri(&png_data),
        height: bounds.height_zone as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::ZoneScanner;
    use crate::surface::SurfaceSize;
    use tiny_skia::{Color, Paint, Rect};

    fn surface_with_band(top: f32, bottom: f32) -> SurfacePair {
        let mut surface = SurfacePair::new(SurfaceSize::new(60, 50)).unwrap();
        let mut paint = Paint::default();
        paint.set_color(Color::BLACK);
        let rect = Rect::from_ltrb(5.0, top, 55.0, bottom).unwrap();
        surface
            .base_mut()
            .fill_rect(rect, &paint, Transform::identity(), None);
        surface
    }

    fn authorship() -> Authorship {
        Authorship {
            author: "Brooke".to_string(),
            color: Swatch::Blue,
        }
    }

    #[test]
    fn test_crop_height_is_whole_zones() {
        let surface = surface_with_band(12.0, 28.0);
        let bounds = ZoneScanner::new(10).scan(surface.base());
        assert_eq!(bounds, ContentBounds { offset_zone: 1, height_zone: 2 });

        let cropped = crop(surface.base(), bounds, 10).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (60, 20));
        // Row 12 of the source lands on row 2 of the crop.
        assert_eq!(cropped.pixel(30, 2).unwrap().alpha(), 255);
        assert_eq!(cropped.pixel(30, 1).unwrap().alpha(), 0);
    }

    #[test]
    fn test_blank_bounds_are_rejected() {
        let surface = SurfacePair::new(SurfaceSize::new(60, 50)).unwrap();
        let result = serialize(&surface, ContentBounds::BLANK, &authorship());
        assert!(matches!(result, Err(ComposeError::EmptySurface)));
    }

    #[test]
    fn test_serialize_produces_png_data_uri() {
        let surface = surface_with_band(22.0, 27.0);
        let bounds = ZoneScanner::new(10).scan(surface.base());
        let content = serialize(&surface, bounds, &authorship()).unwrap();

        assert_eq!(content.author, "Brooke");
        assert_eq!(content.color, Swatch::Blue);
        assert_eq!(content.height, 1);
        assert!(content.img.starts_with(PNG_DATA_URI_PREFIX));

        let decoded = decode_data_uri(&content.img).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 10));
        let pixel = decoded.pixel(30, 4).unwrap();
        assert_eq!((pixel.red(), pixel.alpha()), (0, 255));
    }

    #[test]
    fn test_decode_rejects_foreign_uri() {
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64,AAAA"),
            Err(ComposeError::Decode(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(ComposeError::Decode(_))
        ));
    }
}
