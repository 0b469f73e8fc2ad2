// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster codec seam. The engine only ever asks for "decode these bytes" and
// "encode this surface"; the default implementation uses the `image` crate.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{RasterFormat, RasterRef};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, instrument};

/// A decoded raster together with its native dimensions.
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    pub format: Option<RasterFormat>,
    pub image: DynamicImage,
}

/// Decode and encode encoded rasters.
pub trait RasterCodec: Send + Sync {
    /// Decode encoded bytes. Unreadable input fails with `Decode`.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster>;

    /// Encode a surface into the given format.
    fn encode(&self, image: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>>;

    /// Decode `bytes` once to learn their dimensions and wrap them as a
    /// shareable page raster. The encoded bytes are kept as-is.
    fn load(&self, bytes: Vec<u8>) -> Result<RasterRef> {
        let decoded = self.decode(&bytes)?;
        let format = decoded.format.unwrap_or(RasterFormat::Png);
        Ok(RasterRef::new(bytes, decoded.width, decoded.height, format))
    }
}

/// Default codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl RasterCodec for ImageCodec {
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster> {
        let format = image::guess_format(bytes).ok().and_then(from_image_format);
        let image = image::load_from_memory(bytes)
            .map_err(|err| BlattwerkError::Decode(format!("failed to decode image: {err}")))?;
        debug!(
            width = image.width(),
            height = image.height(),
            ?format,
            "Raster decoded"
        );
        Ok(DecodedRaster {
            width: image.width(),
            height: image.height(),
            format,
            image,
        })
    }

    fn encode(&self, image: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
        encode_to_format(image, format)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
pub(crate) fn encode_to_format(image: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    let target = to_image_format(format);
    // JPEG has no alpha channel; flatten before encoding.
    let result = if target == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut cursor, target)
    } else {
        image.write_to(&mut cursor, target)
    };
    result.map_err(|err| BlattwerkError::Encode(format!("{format:?} encoding failed: {err}")))?;
    Ok(buffer)
}

fn from_image_format(format: ImageFormat) -> Option<RasterFormat> {
    match format {
        ImageFormat::Png => Some(RasterFormat::Png),
        ImageFormat::Jpeg => Some(RasterFormat::Jpeg),
        ImageFormat::Tiff => Some(RasterFormat::Tiff),
        ImageFormat::Bmp => Some(RasterFormat::Bmp),
        ImageFormat::Gif => Some(RasterFormat::Gif),
        ImageFormat::WebP => Some(RasterFormat::Webp),
        _ => None,
    }
}

fn to_image_format(format: RasterFormat) -> ImageFormat {
    match format {
        RasterFormat::Png => ImageFormat::Png,
        RasterFormat::Jpeg => ImageFormat::Jpeg,
        RasterFormat::Tiff => ImageFormat::Tiff,
        RasterFormat::Bmp => ImageFormat::Bmp,
        RasterFormat::Gif => ImageFormat::Gif,
        RasterFormat::Webp => ImageFormat::WebP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        encode_to_format(&DynamicImage::ImageRgb8(img), RasterFormat::Png).expect("encode")
    }

    #[test]
    fn load_reads_dimensions_and_format() {
        let raster = ImageCodec.load(png_bytes(32, 12)).expect("load");
        assert_eq!((raster.width(), raster.height()), (32, 12));
        assert_eq!(raster.format(), RasterFormat::Png);
        assert_eq!(raster.digest().len(), 64);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let result = ImageCodec.decode(b"definitely not an image");
        assert!(matches!(result, Err(BlattwerkError::Decode(_))));
    }

    #[test]
    fn jpeg_encoding_drops_alpha() {
        let rgba = DynamicImage::new_rgba8(8, 8);
        let bytes = ImageCodec.encode(&rgba, RasterFormat::Jpeg).expect("encode");
        let decoded = ImageCodec.decode(&bytes).expect("decode");
        assert_eq!(decoded.format, Some(RasterFormat::Jpeg));
        assert_eq!((decoded.width, decoded.height), (8, 8));
    }
}
