// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — build new PDF documents from page rasters using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use blattwerk_core::error::{BlattwerkError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectId, XObjectTransform,
};
use tracing::{debug, info, instrument};

use super::builder::{DocumentBuilder, ImageHandle, PageHandle, PlacementRect};

/// Resolution rasters are embedded at; only affects the natural size the
/// placement scale is computed against.
const EMBED_DPI: f32 = 72.0;

/// Points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

struct PendingPage {
    width_pt: f32,
    height_pt: f32,
    ops: Vec<Op>,
}

struct EmbeddedImage {
    id: XObjectId,
    width_px: u32,
    height_px: u32,
}

/// Creates a new PDF from composited page rasters.
pub struct PdfWriter {
    doc: PdfDocument,
    pages: Vec<PendingPage>,
    images: Vec<EmbeddedImage>,
}

impl PdfWriter {
    /// Create an empty document with the given title metadata.
    pub fn new(title: impl AsRef<str>) -> Self {
        Self {
            doc: PdfDocument::new(title.as_ref()),
            pages: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Page size in points for a `width_px` x `height_px` raster at `dpi`.
    pub fn page_size_for(width_px: u32, height_px: u32, dpi: f32) -> (f32, f32) {
        let dpi = if dpi > 0.0 { dpi } else { 72.0 };
        (
            width_px as f32 / dpi * 72.0,
            height_px as f32 / dpi * 72.0,
        )
    }
}

impl DocumentBuilder for PdfWriter {
    fn add_page(&mut self, width_pt: f32, height_pt: f32) -> PageHandle {
        self.pages.push(PendingPage {
            width_pt,
            height_pt,
            ops: Vec::new(),
        });
        PageHandle(self.pages.len() - 1)
    }

    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    fn embed_raster(&mut self, bytes: &[u8]) -> Result<ImageHandle> {
        let dynamic_image = ::image::load_from_memory(bytes).map_err(|err| {
            BlattwerkError::Decode(format!("failed to decode raster for PDF: {err}"))
        })?;

        let width_px = dynamic_image.width();
        let height_px = dynamic_image.height();

        // printpdf embeds RGB8 most reliably across viewers.
        let rgb_image = dynamic_image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: width_px as usize,
            height: height_px as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let id = self.doc.add_image(&raw);
        self.images.push(EmbeddedImage {
            id,
            width_px,
            height_px,
        });
        debug!(width_px, height_px, "Raster embedded");
        Ok(ImageHandle(self.images.len() - 1))
    }

    fn draw_image(
        &mut self,
        page: PageHandle,
        image: ImageHandle,
        rect: PlacementRect,
    ) -> Result<()> {
        let embedded = self.images.get(image.0).ok_or_else(|| {
            BlattwerkError::Pdf(format!("image handle {} was never embedded", image.0))
        })?;
        let target = self
            .pages
            .get_mut(page.0)
            .ok_or_else(|| BlattwerkError::Pdf(format!("page handle {} does not exist", page.0)))?;

        // Natural size of the raster at EMBED_DPI, in points.
        let natural_w_pt = embedded.width_px as f32 / EMBED_DPI * 72.0;
        let natural_h_pt = embedded.height_px as f32 / EMBED_DPI * 72.0;

        target.ops.push(Op::UseXobject {
            id: embedded.id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(rect.x)),
                translate_y: Some(Pt(rect.y)),
                scale_x: Some(rect.width / natural_w_pt),
                scale_y: Some(rect.height / natural_h_pt),
                dpi: Some(EMBED_DPI),
                rotate: None,
            },
        });
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn save(mut self) -> Result<Vec<u8>> {
        let pages: Vec<PdfPage> = self
            .pages
            .into_iter()
            .map(|page| {
                PdfPage::new(
                    Mm(page.width_pt / PT_PER_MM),
                    Mm(page.height_pt / PT_PER_MM),
                    page.ops,
                )
            })
            .collect();
        let page_count = pages.len();
        self.doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.doc.save(&PdfSaveOptions::default(), &mut warnings);

        info!(
            pages = page_count,
            bytes = output.len(),
            warnings = warnings.len(),
            "PDF built"
        );
        Ok(output)
    }
}
