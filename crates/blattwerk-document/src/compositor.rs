// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transform compositor — renders a page's final raster: crop, then rotate,
// then (optionally) resample, encoded losslessly as PNG.
//
// Decoding is blocking CPU work; callers inside async code run `render` on
// the blocking pool.

use blattwerk_core::error::Result;
use blattwerk_core::{Page, PageId, RasterFormat, hash_bytes};
use tracing::{debug, instrument};

use crate::raster::codec::{ImageCodec, RasterCodec};
use crate::raster::processor::ImageProcessor;

/// A page rendered to its final pixels.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub page_id: PageId,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of `png`, lowercase hex.
    pub digest: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    scale: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    /// A compositor that keeps native resolution.
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }

    /// Resample output by `scale` (Lanczos3). Non-positive or non-finite
    /// values fall back to 1.0.
    pub fn with_scale(scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Output dimensions of `page` before resampling: the crop size, swapped
    /// for sideways rotations.
    pub fn output_size(page: &Page) -> (u32, u32) {
        let crop = page
            .crop
            .clamped_to(page.raster.width(), page.raster.height());
        if page.rotation.is_sideways() {
            (crop.height, crop.width)
        } else {
            (crop.width, crop.height)
        }
    }

    /// Render `page` with the default codec.
    pub fn render(&self, page: &Page) -> Result<ComposedPage> {
        self.render_with(&ImageCodec, page)
    }

    /// Render `page`, decoding and encoding through `codec`. A source the
    /// codec cannot decode fails with `Decode`.
    #[instrument(skip_all, fields(page_id = %page.id, rotation = page.rotation.degrees()))]
    pub fn render_with(&self, codec: &dyn RasterCodec, page: &Page) -> Result<ComposedPage> {
        let decoded = codec.decode(page.raster.bytes())?;
        let processor = ImageProcessor::from_dynamic(decoded.image)
            .crop(page.crop)
            .rotate(page.rotation)
            .scale(self.scale);

        let (width, height) = (processor.width(), processor.height());
        let png = codec.encode(processor.as_dynamic(), RasterFormat::Png)?;
        let digest = hash_bytes(&png);
        debug!(width, height, bytes = png.len(), "Page composited");

        Ok(ComposedPage {
            page_id: page.id,
            png,
            width,
            height,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::codec::{ImageCodec, RasterCodec};
    use blattwerk_core::error::BlattwerkError;
    use blattwerk_core::{CropRect, RasterFormat, RasterRef, RotateDirection};
    use image::{DynamicImage, Rgb, RgbImage};

    fn page(width: u32, height: u32) -> Page {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]));
        let bytes = ImageCodec
            .encode(&DynamicImage::ImageRgb8(img), RasterFormat::Png)
            .expect("encode");
        let raster = ImageCodec.load(bytes).expect("load");
        Page::new("sample.png", raster)
    }

    #[test]
    fn unedited_page_keeps_dimensions() {
        let composed = Compositor::new().render(&page(30, 20)).expect("render");
        assert_eq!((composed.width, composed.height), (30, 20));
        assert_eq!(composed.digest, hash_bytes(&composed.png));
    }

    #[test]
    fn crop_then_rotate_swaps_dimensions() {
        let mut p = page(30, 20);
        p.set_crop(CropRect::new(5, 0, 10, 20)).expect("crop");
        p.rotate(RotateDirection::Right);
        assert_eq!(Compositor::output_size(&p), (20, 10));

        let composed = Compositor::new().render(&p).expect("render");
        assert_eq!((composed.width, composed.height), (20, 10));
    }

    #[test]
    fn half_turn_keeps_dimensions() {
        let mut p = page(30, 20);
        p.rotate(RotateDirection::Left);
        p.rotate(RotateDirection::Left);
        let composed = Compositor::new().render(&p).expect("render");
        assert_eq!((composed.width, composed.height), (30, 20));
    }

    #[test]
    fn scale_resamples_output() {
        let composed = Compositor::with_scale(0.5).render(&page(30, 20)).expect("render");
        assert_eq!((composed.width, composed.height), (15, 10));
        assert_eq!(Compositor::with_scale(-2.0).scale(), 1.0);
    }

    #[test]
    fn segment_renders_its_band() {
        let parent = page(30, 40);
        let segment = Page::segment(&parent, 1, CropRect::new(0, 25, 30, 15), 0.002);
        let composed = Compositor::new().render(&segment).expect("render");
        assert_eq!((composed.width, composed.height), (30, 15));
    }

    /// Decodes any buffer to a flat grey surface of the recorded size.
    struct FlatCodec;

    impl RasterCodec for FlatCodec {
        fn decode(&self, _bytes: &[u8]) -> Result<crate::raster::codec::DecodedRaster> {
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([90, 90, 90])));
            Ok(crate::raster::codec::DecodedRaster {
                width: 12,
                height: 8,
                format: Some(RasterFormat::Png),
                image,
            })
        }

        fn encode(&self, image: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
            ImageCodec.encode(image, format)
        }
    }

    #[test]
    fn render_with_uses_the_given_codec() {
        let page = Page::new(
            "raw",
            RasterRef::new(b"RAWDATA".to_vec(), 12, 8, RasterFormat::Png),
        );
        assert!(Compositor::new().render(&page).is_err());

        let mut rotated = page.clone();
        rotated.rotate(RotateDirection::Right);
        let composed = Compositor::new()
            .render_with(&FlatCodec, &rotated)
            .expect("render");
        assert_eq!((composed.width, composed.height), (8, 12));
    }

    #[test]
    fn undecodable_raster_is_a_decode_error() {
        let broken = Page::new(
            "broken",
            RasterRef::new(vec![0, 1, 2, 3], 10, 10, RasterFormat::Png),
        );
        assert!(matches!(
            Compositor::new().render(&broken),
            Err(BlattwerkError::Decode(_))
        ));
    }
}
