// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the blattwerk-document crate: compositing a page
// (decode, crop, quarter-turn, PNG encode) on a synthetic scan-sized raster.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use blattwerk_core::{CropRect, Page, RasterFormat, RotateDirection};
use blattwerk_document::{Compositor, ImageCodec, RasterCodec};

fn sample_page(width: u32, height: u32) -> Page {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 90]));
    let bytes = ImageCodec
        .encode(&DynamicImage::ImageRgb8(img), RasterFormat::Png)
        .expect("encode synthetic page");
    Page::new("bench.png", ImageCodec.load(bytes).expect("load synthetic page"))
}

/// Composite a 400x600 page with a crop and a clockwise quarter turn.
fn bench_composite(c: &mut Criterion) {
    let mut page = sample_page(400, 600);
    page.set_crop(CropRect::new(20, 20, 360, 560))
        .expect("crop fits");
    page.rotate(RotateDirection::Right);
    let compositor = Compositor::new();

    c.bench_function("composite (400x600, crop + 90deg)", |b| {
        b.iter(|| {
            let composed = compositor.render(black_box(&page)).expect("render");
            black_box(composed.digest);
        });
    });
}

fn bench_composite_downscale(c: &mut Criterion) {
    let page = sample_page(400, 600);
    let compositor = Compositor::with_scale(0.5);

    c.bench_function("composite (400x600, 0.5x Lanczos3)", |b| {
        b.iter(|| black_box(compositor.render(black_box(&page)).expect("render")));
    });
}

criterion_group!(benches, bench_composite, bench_composite_downscale);
criterion_main!(benches);
