// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — crop, quarter-turn rotation and high-quality resampling
// on one in-memory surface. This is the pixel pipeline the compositor drives.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{CropRect, RasterFormat, Rotation};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, instrument};

use super::codec::encode_to_format;

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let png = ImageProcessor::from_bytes(&bytes)?
///     .crop(CropRect::new(0, 0, 800, 600))
///     .rotate(Rotation::Deg90)
///     .scale(0.5)
///     .to_png_bytes()?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| BlattwerkError::Decode(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Crop a rectangular region. The rectangle is clamped to the image
    /// bounds so a stale crop never panics.
    #[instrument(skip(self))]
    pub fn crop(self, rect: CropRect) -> Self {
        let full = CropRect::full(self.image.width(), self.image.height());
        if rect == full {
            return self;
        }
        let safe = rect.clamped_to(self.image.width(), self.image.height());
        debug!(?safe, "Cropping image");
        Self {
            image: self.image.crop_imm(safe.x, safe.y, safe.width, safe.height),
        }
    }

    /// Rotate by a quarter turn about the centre. Lossless; the surface
    /// swaps width and height for 90 and 270 degrees.
    pub fn rotate(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::Deg0 => return self,
            Rotation::Deg90 => self.image.rotate90(),
            Rotation::Deg180 => self.image.rotate180(),
            Rotation::Deg270 => self.image.rotate270(),
        };
        Self { image }
    }

    /// Resample by `factor` using Lanczos3. A factor of 1.0 is a no-op and
    /// the result is never smaller than one pixel.
    #[instrument(skip(self))]
    pub fn scale(self, factor: f32) -> Self {
        if !factor.is_finite() || factor <= 0.0 || (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        let width = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let height = ((self.image.height() as f32 * factor).round() as u32).max(1);
        debug!(width, height, "Resampling image");
        Self {
            image: self
                .image
                .resize_exact(width, height, FilterType::Lanczos3),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image losslessly as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, RasterFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    /// 4x2 image: left half red, right half blue.
    fn two_tone() -> ImageProcessor {
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(img))
    }

    #[test]
    fn crop_selects_region() {
        let cropped = two_tone().crop(CropRect::new(2, 0, 2, 2));
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.as_dynamic().get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn crop_out_of_bounds_is_clamped() {
        let cropped = two_tone().crop(CropRect::new(3, 1, 50, 50));
        assert_eq!((cropped.width(), cropped.height()), (1, 1));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let rotated = two_tone().rotate(Rotation::Deg90);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
        // Clockwise: the left (red) column ends up on top.
        assert_eq!(rotated.as_dynamic().get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(rotated.as_dynamic().get_pixel(0, 3), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn half_turn_keeps_dimensions() {
        let rotated = two_tone().rotate(Rotation::Deg180);
        assert_eq!((rotated.width(), rotated.height()), (4, 2));
        assert_eq!(rotated.as_dynamic().get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn scale_resamples() {
        let scaled = two_tone().scale(2.0);
        assert_eq!((scaled.width(), scaled.height()), (8, 4));
        let same = two_tone().scale(1.0);
        assert_eq!((same.width(), same.height()), (4, 2));
    }

    #[test]
    fn png_output_round_trips_dimensions() {
        let bytes = two_tone().rotate(Rotation::Deg270).to_png_bytes().expect("png");
        let decoded = ImageProcessor::from_bytes(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (2, 4));
    }
}
