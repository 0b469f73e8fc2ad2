// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Split engine — turns user-drawn polylines into horizontal page segments.
//
// Lines are mapped from the surface they were drawn on into raster space,
// sorted top to bottom, and the raster is carved into the bands between
// them. The strip a line itself covers (from its highest to its lowest
// point) belongs to no segment.

use blattwerk_core::{CropRect, EngineConfig, Page, Point, SplitLine, SurfaceSize};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Affine scale from a drawing surface into raster pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTransform {
    pub sx: f64,
    pub sy: f64,
}

impl SurfaceTransform {
    pub fn identity() -> Self {
        Self { sx: 1.0, sy: 1.0 }
    }

    /// Scale factors mapping `display` coordinates onto `source`. A
    /// degenerate display axis maps 1:1.
    pub fn between(display: SurfaceSize, source: SurfaceSize) -> Self {
        let ratio = |src: f64, disp: f64| {
            if disp.is_finite() && disp > 0.0 {
                src / disp
            } else {
                1.0
            }
        };
        Self {
            sx: ratio(source.width, display.width),
            sy: ratio(source.height, display.height),
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(point.x * self.sx, point.y * self.sy)
    }
}

/// Tunables for one split pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitSettings {
    pub min_segment_height: u32,
    pub order_epsilon: f64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SplitSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_segment_height: config.min_segment_height,
            order_epsilon: config.split_order_epsilon,
        }
    }
}

/// Result of splitting one page.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// No lines were supplied; the page comes back untouched.
    NotRequested(Page),
    /// Lines were supplied but every band was too thin to keep.
    NoSegmentsProduced(Page),
    Segments(Vec<Page>),
}

impl SplitOutcome {
    pub fn into_pages(self) -> Vec<Page> {
        match self {
            Self::NotRequested(page) | Self::NoSegmentsProduced(page) => vec![page],
            Self::Segments(pages) => pages,
        }
    }

    pub fn segment_count(&self) -> usize {
        match self {
            Self::Segments(pages) => pages.len(),
            _ => 0,
        }
    }
}

/// Aggregate of a split pass over several pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReport {
    /// Pages replaced by their segments.
    pub pages_split: usize,
    pub segments_created: usize,
    /// Pages whose lines produced no usable band.
    pub degenerate_pages: usize,
}

impl SplitReport {
    pub(crate) fn record(&mut self, outcome: &SplitOutcome) {
        match outcome {
            SplitOutcome::NotRequested(_) => {}
            SplitOutcome::NoSegmentsProduced(_) => self.degenerate_pages += 1,
            SplitOutcome::Segments(pages) => {
                self.pages_split += 1;
                self.segments_created += pages.len();
            }
        }
    }
}

/// Vertical extent of a line in raster space.
struct MappedLine {
    mean_y: f64,
    min_y: f64,
    max_y: f64,
}

fn map_line(line: &SplitLine, raster: SurfaceSize) -> Option<MappedLine> {
    if line.points.is_empty() {
        return None;
    }
    let transform = SurfaceTransform::between(line.surface, raster);
    let ys: Vec<f64> = line
        .points
        .iter()
        .map(|p| transform.apply(*p).y)
        .filter(|y| y.is_finite())
        .collect();
    if ys.is_empty() {
        return None;
    }
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
    Some(MappedLine {
        mean_y,
        min_y,
        max_y,
    })
}

/// Full-width bands of a `width` x `height` raster left between `lines`,
/// with bands shorter than `min_height` dropped.
pub fn compute_bands(lines: &[SplitLine], width: u32, height: u32, min_height: u32) -> Vec<CropRect> {
    let raster = SurfaceSize::new(f64::from(width), f64::from(height));
    let mut mapped: Vec<MappedLine> = lines.iter().filter_map(|l| map_line(l, raster)).collect();
    mapped.sort_by(|a, b| a.mean_y.total_cmp(&b.mean_y));

    let limit = f64::from(height);
    let to_pixel = |y: f64| y.clamp(0.0, limit).round() as u32;

    let mut raw = Vec::with_capacity(mapped.len() + 1);
    let mut boundary = 0.0_f64;
    for line in &mapped {
        raw.push((boundary, line.min_y));
        // An overlapped line must not pull the boundary back up.
        boundary = boundary.max(line.max_y);
    }
    raw.push((boundary, limit));

    raw.into_iter()
        .filter_map(|(top, bottom)| {
            let (top, bottom) = (to_pixel(top), to_pixel(bottom));
            let band_height = bottom.saturating_sub(top);
            (band_height >= min_height.max(1)).then(|| CropRect::new(0, top, width, band_height))
        })
        .collect()
}

/// Split `page` along `lines`.
pub fn split_page(page: &Page, lines: &[SplitLine], settings: SplitSettings) -> SplitOutcome {
    if lines.is_empty() {
        return SplitOutcome::NotRequested(page.clone());
    }

    let bands = compute_bands(
        lines,
        page.raster.width(),
        page.raster.height(),
        settings.min_segment_height,
    );
    if bands.is_empty() {
        debug!(page_id = %page.id, lines = lines.len(), "All split bands degenerate");
        return SplitOutcome::NoSegmentsProduced(page.clone());
    }

    // Keep every segment strictly before the next whole-number order.
    let count = bands.len() as f64;
    let epsilon = if settings.order_epsilon > 0.0 && settings.order_epsilon * count < 1.0 {
        settings.order_epsilon
    } else {
        1.0 / (count + 1.0)
    };

    let segments: Vec<Page> = bands
        .into_iter()
        .enumerate()
        .map(|(index, band)| {
            let order = page.order + (index as f64 + 1.0) * epsilon;
            Page::segment(page, index as u32, band, order)
        })
        .collect();

    debug!(page_id = %page.id, segments = segments.len(), "Page split");
    SplitOutcome::Segments(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blattwerk_core::{RasterFormat, RasterRef};

    fn page(width: u32, height: u32) -> Page {
        Page::new(
            "scan.png",
            RasterRef::new(vec![7; 16], width, height, RasterFormat::Png),
        )
    }

    #[test]
    fn transform_is_a_pure_scale() {
        let t = SurfaceTransform::between(SurfaceSize::new(500.0, 400.0), SurfaceSize::new(1000.0, 1200.0));
        assert_eq!(t, SurfaceTransform { sx: 2.0, sy: 3.0 });
        assert_eq!(t.apply(Point::new(10.0, 10.0)), Point::new(20.0, 30.0));
        let flat = SurfaceTransform::between(SurfaceSize::new(0.0, 0.0), SurfaceSize::new(10.0, 10.0));
        assert_eq!(flat, SurfaceTransform::identity());
    }

    #[test]
    fn zero_lines_returns_page_unchanged() {
        let p = page(100, 200);
        match split_page(&p, &[], SplitSettings::default()) {
            SplitOutcome::NotRequested(out) => assert_eq!(out, p),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn k_lines_make_k_plus_one_segments() {
        let p = page(100, 300);
        let lines = vec![
            SplitLine::horizontal(200.0, 100, 300),
            SplitLine::horizontal(100.0, 100, 300),
        ];
        let SplitOutcome::Segments(segments) = split_page(&p, &lines, SplitSettings::default())
        else {
            panic!("expected segments");
        };
        assert_eq!(segments.len(), 3);
        let total: u32 = segments.iter().map(|s| s.crop.height).sum();
        assert_eq!(total, 300);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.crop.width, 100);
            assert_eq!(segment.parent_page_id(), Some(p.id));
            assert_eq!(segment.lineage.map(|l| l.split_index), Some(i as u32));
            assert!(segment.split_lines().is_empty());
            assert!(segment.raster.shares_buffer_with(&p.raster));
        }
        assert_eq!(segments[1].crop, CropRect::new(0, 100, 100, 100));
    }

    #[test]
    fn slanted_line_removes_its_strip() {
        let line = SplitLine::new(
            vec![Point::new(0.0, 40.0), Point::new(100.0, 60.0)],
            SurfaceSize::new(100.0, 100.0),
        );
        let bands = compute_bands(&[line], 100, 100, 5);
        assert_eq!(bands, vec![CropRect::new(0, 0, 100, 40), CropRect::new(0, 60, 100, 40)]);
        let total: u32 = bands.iter().map(|b| b.height).sum();
        assert_eq!(total, 100 - 20);
    }

    #[test]
    fn overlapping_lines_never_reopen_a_strip() {
        let slanted = SplitLine::new(
            vec![Point::new(0.0, 10.0), Point::new(100.0, 90.0)],
            SurfaceSize::new(100.0, 200.0),
        );
        let nested = SplitLine::new(
            vec![Point::new(0.0, 55.0), Point::new(100.0, 65.0)],
            SurfaceSize::new(100.0, 200.0),
        );
        let bands = compute_bands(&[slanted, nested], 100, 200, 5);
        assert_eq!(
            bands,
            vec![CropRect::new(0, 0, 100, 10), CropRect::new(0, 90, 100, 110)]
        );
    }

    #[test]
    fn lines_are_rescaled_from_the_drawing_surface() {
        // Drawn on a half-size preview: y=50 on screen is y=100 in pixels.
        let line = SplitLine::new(
            vec![Point::new(0.0, 50.0), Point::new(50.0, 50.0)],
            SurfaceSize::new(50.0, 100.0),
        );
        let bands = compute_bands(&[line], 100, 200, 5);
        assert_eq!(bands, vec![CropRect::new(0, 0, 100, 100), CropRect::new(0, 100, 100, 100)]);
    }

    #[test]
    fn thin_bands_are_dropped() {
        let lines = vec![
            SplitLine::horizontal(2.0, 100, 100),
            SplitLine::horizontal(50.0, 100, 100),
        ];
        let bands = compute_bands(&lines, 100, 100, 5);
        assert_eq!(bands, vec![CropRect::new(0, 2, 100, 48), CropRect::new(0, 50, 100, 50)]);
    }

    #[test]
    fn all_degenerate_bands_report_no_segments() {
        let p = page(100, 8);
        let lines = vec![SplitLine::horizontal(4.0, 100, 8)];
        assert!(matches!(
            split_page(&p, &lines, SplitSettings::default()),
            SplitOutcome::NoSegmentsProduced(out) if out == p
        ));
    }

    #[test]
    fn empty_polylines_are_ignored() {
        let lines = vec![SplitLine::new(Vec::new(), SurfaceSize::new(10.0, 10.0))];
        assert_eq!(compute_bands(&lines, 100, 100, 5), vec![CropRect::full(100, 100)]);
    }

    #[test]
    fn segment_orders_stay_below_next_page() {
        let p = page(100, 1000).with_order(4.0);
        let lines: Vec<SplitLine> = (1..10)
            .map(|i| SplitLine::horizontal(f64::from(i) * 100.0, 100, 1000))
            .collect();
        let settings = SplitSettings {
            min_segment_height: 5,
            order_epsilon: 0.25,
        };
        let segments = split_page(&p, &lines, settings).into_pages();
        assert_eq!(segments.len(), 10);
        assert!(segments.windows(2).all(|w| w[0].order < w[1].order));
        assert!(segments.iter().all(|s| s.order > 4.0 && s.order < 5.0));
    }

    #[test]
    fn report_tallies_outcomes() {
        let p = page(100, 100);
        let mut report = SplitReport::default();
        report.record(&SplitOutcome::NotRequested(p.clone()));
        report.record(&SplitOutcome::NoSegmentsProduced(p.clone()));
        report.record(&split_page(&p, &[SplitLine::horizontal(50.0, 100, 100)], SplitSettings::default()));
        assert_eq!(
            report,
            SplitReport {
                pages_split: 1,
                segments_created: 2,
                degenerate_pages: 1
            }
        );
    }
}
