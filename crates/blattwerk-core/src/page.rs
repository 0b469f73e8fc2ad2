// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page model — geometry, shared raster buffers, and the editable page entity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BlattwerkError, Result};
use crate::types::{PageId, RasterFormat};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Quarter-turn rotation applied at composite time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Build a rotation from any multiple of 90 degrees, normalised modulo 360.
    /// Returns `None` for angles that are not quarter turns.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Rotate a quarter turn clockwise.
    pub fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// Rotate a quarter turn counter-clockwise.
    pub fn counter_clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg270,
            Self::Deg90 => Self::Deg0,
            Self::Deg180 => Self::Deg90,
            Self::Deg270 => Self::Deg180,
        }
    }

    /// Whether the output swaps width and height.
    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Direction of a rotate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Left,
    Right,
}

/// Pixel rectangle inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole extent of a `width` x `height` raster.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether the rectangle is non-empty and lies inside the raster.
    pub fn fits_within(&self, raster_width: u32, raster_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(raster_width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(raster_height)
    }

    /// Clamp the rectangle into a raster, keeping at least one pixel.
    pub fn clamped_to(&self, raster_width: u32, raster_height: u32) -> Self {
        let x = self.x.min(raster_width.saturating_sub(1));
        let y = self.y.min(raster_height.saturating_sub(1));
        let width = self.width.min(raster_width - x).max(1);
        let height = self.height.min(raster_height - y).max(1);
        Self::new(x, y, width, height)
    }
}

/// A 2D point in some drawing surface's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Dimensions of a drawing surface or raster, in its own units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A user-drawn split line: a polyline plus the surface it was drawn on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitLine {
    pub points: Vec<Point>,
    pub surface: SurfaceSize,
}

impl SplitLine {
    pub fn new(points: Vec<Point>, surface: SurfaceSize) -> Self {
        Self { points, surface }
    }

    /// A straight horizontal line at `y`, drawn directly in raster space.
    pub fn horizontal(y: f64, raster_width: u32, raster_height: u32) -> Self {
        Self::new(
            vec![Point::new(0.0, y), Point::new(f64::from(raster_width), y)],
            SurfaceSize::new(f64::from(raster_width), f64::from(raster_height)),
        )
    }
}

// ---------------------------------------------------------------------------
// Raster buffers
// ---------------------------------------------------------------------------

/// Shared, immutable encoded raster.
///
/// Cloning is cheap: the encoded bytes are reference-counted so pages, their
/// backups, split segments and history entries all point at one buffer.
#[derive(Clone)]
pub struct RasterRef {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    format: RasterFormat,
    digest: Arc<str>,
}

impl RasterRef {
    /// Wrap encoded bytes whose native dimensions are already known.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, format: RasterFormat) -> Self {
        let digest = hash_bytes(&bytes);
        Self {
            bytes: Arc::from(bytes),
            width,
            height,
            format,
            digest: Arc::from(digest),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    /// SHA-256 of the encoded bytes, lowercase hex.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(f64::from(self.width), f64::from(self.height))
    }

    /// Whether both references share one underlying buffer.
    pub fn shares_buffer_with(&self, other: &RasterRef) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl PartialEq for RasterRef {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.digest == other.digest
    }
}

impl std::fmt::Debug for RasterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterRef")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .field("digest", &&self.digest[..12.min(self.digest.len())])
            .finish()
    }
}

/// Compute the SHA-256 hash of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Where a split segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub parent_page_id: PageId,
    pub split_index: u32,
    /// The band of the parent raster this segment covers.
    pub band: CropRect,
}

/// A document page under edit.
///
/// `split_lines` is private so the "only unsplit pages take split lines"
/// invariant cannot be bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: PageId,
    pub name: String,
    pub raster: RasterRef,
    pub rotation: Rotation,
    pub crop: CropRect,
    pub order: f64,
    pub lineage: Option<Lineage>,
    /// Pre-edit raster, set the first time the raster is replaced.
    pub original_raster: Option<RasterRef>,
    pub is_original: bool,
    split_lines: Vec<SplitLine>,
}

impl Page {
    pub fn new(name: impl Into<String>, raster: RasterRef) -> Self {
        let crop = CropRect::full(raster.width(), raster.height());
        Self {
            id: PageId::new(),
            name: name.into(),
            raster,
            rotation: Rotation::Deg0,
            crop,
            order: 0.0,
            lineage: None,
            original_raster: None,
            is_original: true,
            split_lines: Vec::new(),
        }
    }

    /// Build the `split_index`-th segment of `parent`, covering `band`.
    pub fn segment(parent: &Page, split_index: u32, band: CropRect, order: f64) -> Self {
        Self {
            id: PageId::new(),
            name: parent.name.clone(),
            raster: parent.raster.clone(),
            rotation: Rotation::Deg0,
            crop: band,
            order,
            lineage: Some(Lineage {
                parent_page_id: parent.id,
                split_index,
                band,
            }),
            original_raster: parent.original_raster.clone(),
            is_original: parent.is_original,
            split_lines: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = order;
        self
    }

    pub fn is_segment(&self) -> bool {
        self.lineage.is_some()
    }

    pub fn parent_page_id(&self) -> Option<PageId> {
        self.lineage.map(|l| l.parent_page_id)
    }

    /// The crop a reset returns to: the segment band, or the full raster.
    pub fn default_crop(&self) -> CropRect {
        match self.lineage {
            Some(lineage) => lineage
                .band
                .clamped_to(self.raster.width(), self.raster.height()),
            None => CropRect::full(self.raster.width(), self.raster.height()),
        }
    }

    // -- Rotation -------------------------------------------------------------

    pub fn rotate(&mut self, direction: RotateDirection) {
        self.rotation = match direction {
            RotateDirection::Left => self.rotation.counter_clockwise(),
            RotateDirection::Right => self.rotation.clockwise(),
        };
    }

    // -- Crop -----------------------------------------------------------------

    pub fn set_crop(&mut self, rect: CropRect) -> Result<()> {
        if !rect.fits_within(self.raster.width(), self.raster.height()) {
            return Err(BlattwerkError::InvalidCrop {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                raster_width: self.raster.width(),
                raster_height: self.raster.height(),
            });
        }
        self.crop = rect;
        Ok(())
    }

    // -- Split lines ----------------------------------------------------------

    pub fn split_lines(&self) -> &[SplitLine] {
        &self.split_lines
    }

    pub fn add_split_line(&mut self, line: SplitLine) -> Result<()> {
        if self.is_segment() {
            return Err(BlattwerkError::SplitLinesOnSegment(self.id.to_string()));
        }
        self.split_lines.push(line);
        Ok(())
    }

    pub fn clear_split_lines(&mut self) {
        self.split_lines.clear();
    }

    // -- Raster edits ---------------------------------------------------------

    /// Install an externally edited raster, backing up the current one the
    /// first time. The crop is reset when the dimensions change.
    pub fn replace_raster(&mut self, raster: RasterRef) {
        if raster == self.raster {
            return;
        }
        if self.original_raster.is_none() {
            self.original_raster = Some(self.raster.clone());
        }
        let resized =
            raster.width() != self.raster.width() || raster.height() != self.raster.height();
        self.raster = raster;
        self.is_original = false;
        if resized {
            self.crop = self.default_crop();
        }
    }

    /// Restore the original raster, clear rotation, crop and pending lines.
    pub fn reset_to_original(&mut self) {
        if let Some(original) = self.original_raster.take() {
            self.raster = original;
        }
        self.is_original = true;
        self.rotation = Rotation::Deg0;
        self.crop = self.default_crop();
        self.split_lines.clear();
    }

    /// Copy of this page under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: PageId::new(),
            ..self.clone()
        }
    }
}
