// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document — Pixel and document primitives behind the engine seams.
//
// Provides the raster codec (decode, encode, crop, quarter-turn rotation,
// resampling), the PDF page source (page count, embedded raster extraction,
// merge), the PDF builder, and the transform compositor that turns
// an edited page into its final raster.

pub mod compositor;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod pdf;
pub mod raster;

// Re-export the primary structs so callers can use `blattwerk_document::PdfReader` etc.
pub use compositor::{ComposedPage, Compositor};
pub use pdf::builder::{DocumentBuilder, ImageHandle, PageHandle, PlacementRect};
pub use pdf::reader::{PageSource, PdfMerger, PdfReader};
pub use pdf::writer::PdfWriter;
pub use raster::codec::{DecodedRaster, ImageCodec, RasterCodec};
pub use raster::processor::ImageProcessor;
