// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paginated-document builder seam.

use blattwerk_core::error::Result;

/// Handle to a page added with [`DocumentBuilder::add_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle(pub usize);

/// Handle to a raster embedded with [`DocumentBuilder::embed_raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub usize);

/// Placement rectangle in PDF points, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PlacementRect {
    /// A rectangle covering a whole `width` x `height` page.
    pub fn full_page(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

/// Builds a paginated document one page at a time.
pub trait DocumentBuilder {
    /// Append an empty page of the given size in points.
    fn add_page(&mut self, width_pt: f32, height_pt: f32) -> PageHandle;

    /// Embed an encoded raster so it can be drawn on any page.
    fn embed_raster(&mut self, bytes: &[u8]) -> Result<ImageHandle>;

    /// Draw an embedded raster into `rect` on `page`.
    fn draw_image(&mut self, page: PageHandle, image: ImageHandle, rect: PlacementRect)
    -> Result<()>;

    /// Number of pages added so far.
    fn page_count(&self) -> usize;

    /// Serialise the document.
    fn save(self) -> Result<Vec<u8>>
    where
        Self: Sized;
}
