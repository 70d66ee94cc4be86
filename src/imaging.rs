//! Raster operations needed to save two-page spreads.
//!
//! The only transformation the crate performs on page images is placing two pages side by
//! side. Everything else is copied byte for byte.

use image::{DynamicImage, GenericImage, Rgba, RgbaImage};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::types::ImageFormatInfo;

/// Fill used where the shorter page of a spread leaves empty space.
const SPREAD_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Decodes raw page bytes into a raster.
///
/// # Arguments
///
/// * `bytes` - Encoded image content
/// * `name` - Entry name, used for error reporting only
pub fn decode(bytes: &[u8], name: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::Decode(name.to_string(), e.to_string()))
}

/// Places `left` and `right` next to each other, top-aligned.
///
/// The result is as wide as both pages together and as tall as the taller one.
pub fn compose_horizontal(left: &DynamicImage, right: &DynamicImage) -> Result<DynamicImage> {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());

    let mut canvas = RgbaImage::from_pixel(width, height, SPREAD_BACKGROUND);
    canvas.copy_from(&left.to_rgba8(), 0, 0)?;
    canvas.copy_from(&right.to_rgba8(), left.width(), 0)?;

    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Encodes a raster in the format implied by `name_hint`'s extension.
pub fn encode(image: &DynamicImage, name_hint: &str) -> Result<Vec<u8>> {
    let format = ImageFormatInfo::from_name(name_hint)?.image_format();

    // JPEG has no alpha channel
    let image = match format {
        image::ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image.clone(),
    };

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

/// Decodes two pages, joins them and encodes the spread for `name_hint`.
pub fn join_pages(
    left: &[u8],
    left_name: &str,
    right: &[u8],
    right_name: &str,
    name_hint: &str,
) -> Result<Vec<u8>> {
    let left = decode(left, left_name)?;
    let right = decode(right, right_name)?;
    let spread = compose_horizontal(&left, &right)?;
    encode(&spread, name_hint)
}
