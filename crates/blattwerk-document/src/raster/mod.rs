// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module — decode/encode seam and the in-memory image pipeline.

pub mod codec;
pub mod processor;

pub use codec::{DecodedRaster, ImageCodec, RasterCodec};
pub use processor::ImageProcessor;
