//! Conversion between rendered frames and 8-bit RGBA images.

use std::path::Path;

use glam::Vec4;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageError, ImageResult, Rgba, RgbaImage};

use radiant_foam::Frame;

#[inline]
fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn frame_to_image(frame: &Frame) -> RgbaImage {
    RgbaImage::from_fn(frame.width, frame.height, |x, y| {
        let c = frame.get(x, y);
        Rgba([to_byte(c.x), to_byte(c.y), to_byte(c.z), to_byte(c.w)])
    })
}

pub fn image_to_frame(image: &RgbaImage) -> Frame {
    let pixels = image
        .pixels()
        .map(|p| Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0)
        .collect();
    Frame {
        width: image.width(),
        height: image.height(),
        pixels,
    }
}

/// Write `frame` as an image; the format follows the extension.
pub fn save_frame(frame: &Frame, path: &Path) -> ImageResult<()> {
    frame_to_image(frame).save(path)
}

/// Load a background image as a display-space frame.
pub fn load_background(path: &Path) -> ImageResult<Frame> {
    let image = image::open(path)?.to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }
    log::debug!(
        "Background {}: {}x{}",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image_to_frame(&image))
}
