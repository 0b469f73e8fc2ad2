// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixtures shared by the engine's unit tests.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

/// A real PNG with a vertical gradient so crops and segments differ.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |_, y| {
        let shade = ((y * 255) / height.max(1)) as u8;
        Rgb([shade, 255 - shade, 64])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

pub(crate) use blattwerk_document::fixtures::sample_pdf;
