// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading page rasters out of existing PDFs, merging, and
// building new PDFs from composited page rasters.

pub mod builder;
pub mod reader;
pub mod writer;

pub use builder::{DocumentBuilder, ImageHandle, PageHandle, PlacementRect};
pub use reader::{PageSource, PdfMerger, PdfReader};
pub use writer::PdfWriter;
