//! Pixel difference computation for consecutive screenshots.
//!
//! Produces two PNG artifacts per screenshot pair: the per-channel absolute
//! difference image, and a binary mask of the pixels that changed.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;

/// Error raised by a [`DiffEngine`].
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// Computes diff artifacts from PNG-encoded captures.
pub trait DiffEngine {
    /// Difference image of `current` against `previous`.
    fn difference(&self, current: &[u8], previous: &[u8]) -> Result<Vec<u8>, EngineError>;

    /// Changed-pixel mask derived from a difference image.
    fn mask(&self, difference: &[u8]) -> Result<Vec<u8>, EngineError>;
}

/// Default engine backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelDiff;

impl DiffEngine for PixelDiff {
    fn difference(&self, current: &[u8], previous: &[u8]) -> Result<Vec<u8>, EngineError> {
        let current = decode_rgb(current)?;
        let previous = decode_rgb(previous)?;

        // Captures of different sizes are compared over their overlap.
        let width = current.width().min(previous.width());
        let height = current.height().min(previous.height());
        let diff = RgbImage::from_fn(width, height, |x, y| {
            let a = current.get_pixel(x, y);
            let b = previous.get_pixel(x, y);
            Rgb([
                a[0].abs_diff(b[0]),
                a[1].abs_diff(b[1]),
                a[2].abs_diff(b[2]),
            ])
        });
        encode_png(DynamicImage::ImageRgb8(diff))
    }

    fn mask(&self, difference: &[u8]) -> Result<Vec<u8>, EngineError> {
        let diff = decode_rgb(difference)?;
        let mask = GrayImage::from_fn(diff.width(), diff.height(), |x, y| {
            let px = diff.get_pixel(x, y);
            if px.0.iter().any(|c| *c > 0) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        encode_png(DynamicImage::ImageLuma8(mask))
    }
}

/// Fraction of pixels set in a mask produced by [`PixelDiff::mask`].
pub fn changed_ratio(mask: &[u8]) -> Result<f64, EngineError> {
    let mask = image::load_from_memory_with_format(mask, ImageFormat::Png)?.to_luma8();
    let total = u64::from(mask.width()) * u64::from(mask.height());
    if total == 0 {
        return Ok(0.0);
    }
    let changed = mask.pixels().filter(|p| p[0] > 0).count() as u64;
    Ok(changed as f64 / total as f64)
}

fn decode_rgb(png: &[u8]) -> Result<RgbImage, EngineError> {
    Ok(image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgb8())
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
