// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workspace — page editing operations on the active session.
//
// Operations that change page identity or pixel content record an undo
// snapshot of the pre-mutation list first. Every failing operation leaves
// the page list untouched.

use std::collections::BTreeSet;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{
    CropRect, EngineConfig, InstanceId, Page, PageId, Point, RasterRef, RotateDirection, Rotation,
    SessionId, SplitLine, SurfaceSize,
};
use blattwerk_store::{KeyValueStore, SessionManifest, load_manifest, save_manifest};
use tracing::{debug, info, instrument, warn};

use crate::rearrange::parse_rearrange;
use crate::session::SessionManager;
use crate::split::{SplitReport, SplitSettings, split_page};

/// Sort by `order` and renumber to consecutive integers.
pub(crate) fn normalize_order(pages: &mut [Page]) {
    pages.sort_by(|a, b| a.order.total_cmp(&b.order));
    for (index, page) in pages.iter_mut().enumerate() {
        page.order = index as f64;
    }
}

/// The editing engine of one process instance.
#[derive(Debug)]
pub struct Workspace {
    sessions: SessionManager,
    config: EngineConfig,
    instance_id: InstanceId,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Workspace {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_instance(InstanceId::new(), config)
    }

    /// A workspace that persists under a known instance id.
    pub fn with_instance(instance_id: InstanceId, config: EngineConfig) -> Self {
        Self {
            sessions: SessionManager::new(config.history_limit),
            config,
            instance_id,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Pages of the active session in display order.
    pub fn pages(&self) -> &[Page] {
        self.sessions.pages()
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages().iter().find(|p| p.id == id)
    }

    /// Owned copy of the active session's pages for a job to work on.
    pub fn export_snapshot(&self) -> Vec<Page> {
        let mut pages = self.pages().to_vec();
        pages.sort_by(|a, b| a.order.total_cmp(&b.order));
        pages
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut Page> {
        self.sessions
            .pages_mut()
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BlattwerkError::PageNotFound(id.to_string()))
    }

    fn require_page(&self, id: PageId) -> Result<()> {
        match self.page(id) {
            Some(_) => Ok(()),
            None => Err(BlattwerkError::PageNotFound(id.to_string())),
        }
    }

    /// Record the active session's current pages on its undo stack.
    fn checkpoint(&mut self) -> Result<()> {
        let active = self.sessions.active_id();
        let (pages, history) = self.sessions.parts_mut(active)?;
        history.snapshot(pages);
        Ok(())
    }

    // -- Rotation and crop ----------------------------------------------------

    pub fn rotate_left(&mut self, id: PageId) -> Result<Rotation> {
        let page = self.page_mut(id)?;
        page.rotate(RotateDirection::Left);
        Ok(page.rotation)
    }

    pub fn rotate_right(&mut self, id: PageId) -> Result<Rotation> {
        let page = self.page_mut(id)?;
        page.rotate(RotateDirection::Right);
        Ok(page.rotation)
    }

    /// Rotate every selected page; returns how many were rotated.
    pub fn rotate_selected(&mut self, direction: RotateDirection) -> usize {
        let selection = self.sessions.ui().selection.clone();
        let mut rotated = 0;
        for page in self.sessions.pages_mut().iter_mut() {
            if selection.contains(&page.id) {
                page.rotate(direction);
                rotated += 1;
            }
        }
        rotated
    }

    pub fn set_crop(&mut self, id: PageId, rect: CropRect) -> Result<()> {
        self.page_mut(id)?.set_crop(rect)
    }

    // -- Split lines ----------------------------------------------------------

    pub fn add_split_line(
        &mut self,
        id: PageId,
        points: Vec<Point>,
        surface: SurfaceSize,
    ) -> Result<()> {
        self.page_mut(id)?
            .add_split_line(SplitLine::new(points, surface))
    }

    pub fn clear_split_lines(&mut self, id: PageId) -> Result<()> {
        self.page_mut(id)?.clear_split_lines();
        Ok(())
    }

    /// Split one page along its pending lines.
    pub fn apply_split(&mut self, id: PageId) -> Result<SplitReport> {
        self.require_page(id)?;
        self.split_where(Some(id))
    }

    /// Split every page that has pending lines.
    pub fn apply_split_all(&mut self) -> Result<SplitReport> {
        self.split_where(None)
    }

    #[instrument(skip(self))]
    fn split_where(&mut self, target: Option<PageId>) -> Result<SplitReport> {
        let settings = SplitSettings::from(&self.config);
        let wanted =
            |page: &Page| target.is_none_or(|id| page.id == id) && !page.split_lines().is_empty();

        let active = self.sessions.active_id();
        let (pages, history) = self.sessions.parts_mut(active)?;
        if !pages.iter().any(wanted) {
            return Ok(SplitReport::default());
        }
        history.snapshot(pages);

        let mut report = SplitReport::default();
        let mut next = Vec::with_capacity(pages.len());
        for page in pages.drain(..) {
            if !wanted(&page) {
                next.push(page);
                continue;
            }
            let outcome = split_page(&page, page.split_lines(), settings);
            report.record(&outcome);
            next.extend(outcome.into_pages());
        }
        normalize_order(&mut next);
        *pages = next;

        info!(
            pages_split = report.pages_split,
            segments = report.segments_created,
            degenerate = report.degenerate_pages,
            "Split applied"
        );
        Ok(report)
    }

    // -- Raster edits ---------------------------------------------------------

    pub fn reset_to_original(&mut self, id: PageId) -> Result<()> {
        self.require_page(id)?;
        self.checkpoint()?;
        self.page_mut(id)?.reset_to_original();
        Ok(())
    }

    /// Install an externally produced raster on a page.
    pub fn replace_raster(&mut self, id: PageId, raster: RasterRef) -> Result<()> {
        self.require_page(id)?;
        self.checkpoint()?;
        self.page_mut(id)?.replace_raster(raster);
        Ok(())
    }

    // -- Structure ------------------------------------------------------------

    /// Delete the listed pages. Unknown ids are ignored as long as at least
    /// one page matches.
    pub fn delete_pages(&mut self, ids: &[PageId]) -> Result<usize> {
        let doomed: BTreeSet<PageId> = ids.iter().copied().collect();
        if !self.pages().iter().any(|p| doomed.contains(&p.id)) {
            let first = ids.first().map(ToString::to_string).unwrap_or_default();
            return Err(BlattwerkError::PageNotFound(first));
        }
        self.checkpoint()?;

        let pages = self.sessions.pages_mut();
        let before = pages.len();
        pages.retain(|p| !doomed.contains(&p.id));
        normalize_order(pages);
        let removed = before - pages.len();

        let ui = self.sessions.ui().clone().without_pages(&doomed);
        self.sessions.set_ui(ui);
        debug!(removed, "Pages deleted");
        Ok(removed)
    }

    /// Insert a copy of a page right after it; returns the copy's id.
    pub fn duplicate_page(&mut self, id: PageId) -> Result<PageId> {
        self.require_page(id)?;
        self.checkpoint()?;

        let pages = self.sessions.pages_mut();
        let index = pages
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| BlattwerkError::PageNotFound(id.to_string()))?;
        let copy = pages[index].duplicate().with_order(pages[index].order + 0.5);
        let copy_id = copy.id;
        pages.push(copy);
        normalize_order(pages);
        Ok(copy_id)
    }

    /// Move a page by `delta` positions, clamped to the list; returns its
    /// new 0-based position.
    pub fn move_page(&mut self, id: PageId, delta: isize) -> Result<usize> {
        self.require_page(id)?;
        self.checkpoint()?;

        let pages = self.sessions.pages_mut();
        normalize_order(pages);
        let from = pages
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| BlattwerkError::PageNotFound(id.to_string()))?;
        let last = pages.len() - 1;
        let to = from.saturating_add_signed(delta).min(last);
        let page = pages.remove(from);
        pages.insert(to, page);
        for (index, page) in pages.iter_mut().enumerate() {
            page.order = index as f64;
        }
        Ok(to)
    }

    /// Reorder the session from a "3,1,2" style list. Anything other than a
    /// permutation of every page is rejected without touching the session.
    #[instrument(skip(self))]
    pub fn apply_input_rearrange(&mut self, input: &str) -> Result<()> {
        let current = self.export_snapshot();
        let indices = parse_rearrange(input, current.len())?;
        self.checkpoint()?;

        let reordered: Vec<Page> = indices
            .into_iter()
            .enumerate()
            .map(|(position, index)| current[index].clone().with_order(position as f64))
            .collect();
        *self.sessions.pages_mut() = reordered;
        info!(pages = current.len(), "Pages rearranged");
        Ok(())
    }

    /// Restore the list recorded before the last identity-changing edit.
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let active = self.sessions.active_id();
        let Ok((pages, history)) = self.sessions.parts_mut(active) else {
            return false;
        };
        match history.undo() {
            Some(previous) => {
                *pages = previous;
                debug!(pages = pages.len(), "Undo applied");
                true
            }
            None => false,
        }
    }

    // -- Job results ----------------------------------------------------------

    /// Append pages produced by a job to `session_id`. When the session has
    /// been closed in the meantime the pages are discarded.
    #[instrument(skip(self, pages), fields(count = pages.len()))]
    pub fn install_pages(&mut self, session_id: SessionId, pages: Vec<Page>) -> usize {
        if pages.is_empty() {
            return 0;
        }
        let Ok((list, history)) = self.sessions.parts_mut(session_id) else {
            warn!(%session_id, "Session closed before job results arrived; discarding pages");
            return 0;
        };
        history.snapshot(list);

        normalize_order(list);
        let base = list.len();
        let count = pages.len();
        list.extend(
            pages
                .into_iter()
                .enumerate()
                .map(|(i, page)| page.with_order((base + i) as f64)),
        );
        debug!(installed = count, "Pages installed");
        count
    }

    // -- Persistence ----------------------------------------------------------

    /// Write the session manifest. Returns `false` when the store's quota
    /// refused the record.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<bool> {
        let manifest = SessionManifest::new(self.instance_id, self.sessions.sessions());
        save_manifest(store, &manifest)
    }

    /// Rebuild the session set from this instance's manifest, if any.
    pub fn restore(&mut self, store: &dyn KeyValueStore) -> Result<bool> {
        match load_manifest(store, self.instance_id)? {
            Some(manifest) => {
                self.sessions.restore(&manifest.sessions);
                info!(sessions = manifest.sessions.len(), "Sessions restored");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blattwerk_core::RasterFormat;
    use blattwerk_store::MemoryStore;

    fn raster(tag: u8, width: u32, height: u32) -> RasterRef {
        RasterRef::new(vec![tag; 12], width, height, RasterFormat::Png)
    }

    /// Workspace with pages named A, B, C... in order.
    fn workspace_with(names: &[&str]) -> (Workspace, Vec<PageId>) {
        let mut ws = Workspace::default();
        let session = ws.sessions().active_id();
        let pages: Vec<Page> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Page::new(*name, raster(i as u8, 100, 200)))
            .collect();
        let ids = pages.iter().map(|p| p.id).collect();
        ws.install_pages(session, pages);
        (ws, ids)
    }

    fn names(ws: &Workspace) -> Vec<String> {
        ws.pages().iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn rearrange_example() {
        let (mut ws, _) = workspace_with(&["A", "B", "C"]);
        ws.apply_input_rearrange("3,1,2").expect("rearrange");
        assert_eq!(names(&ws), vec!["C", "A", "B"]);
        let orders: Vec<f64> = ws.pages().iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn invalid_rearrange_leaves_pages_untouched() {
        let (mut ws, _) = workspace_with(&["A", "B", "C"]);
        let before = ws.pages().to_vec();
        let undo_depth = ws.sessions().history().len();
        for input in ["3,1", "1,1,2", "1,2,9", "x"] {
            assert!(matches!(
                ws.apply_input_rearrange(input),
                Err(BlattwerkError::InvalidReorderSpecification(_))
            ));
        }
        assert_eq!(ws.pages(), before.as_slice());
        assert_eq!(ws.sessions().history().len(), undo_depth);
    }

    #[test]
    fn apply_split_all_then_undo() {
        let (mut ws, ids) = workspace_with(&["A", "B"]);
        let before = ws.pages().to_vec();
        ws.add_split_line(
            ids[0],
            vec![Point::new(0.0, 50.0), Point::new(50.0, 50.0)],
            SurfaceSize::new(50.0, 100.0),
        )
        .expect("line");
        let with_lines = ws.pages().to_vec();

        let report = ws.apply_split_all().expect("split");
        assert_eq!(report.pages_split, 1);
        assert_eq!(report.segments_created, 2);
        assert_eq!(names(&ws), vec!["A", "A", "B"]);
        let orders: Vec<f64> = ws.pages().iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![0.0, 1.0, 2.0]);
        assert!(ws.pages()[0].is_segment());

        assert!(ws.undo());
        assert_eq!(ws.pages(), with_lines.as_slice());
        assert_ne!(ws.pages(), before.as_slice());
    }

    #[test]
    fn apply_split_without_lines_is_a_noop() {
        let (mut ws, ids) = workspace_with(&["A"]);
        let depth = ws.sessions().history().len();
        assert_eq!(ws.apply_split(ids[0]).expect("split"), SplitReport::default());
        assert_eq!(ws.sessions().history().len(), depth);
        assert!(matches!(
            ws.apply_split(PageId::new()),
            Err(BlattwerkError::PageNotFound(_))
        ));
    }

    #[test]
    fn segments_refuse_new_lines() {
        let (mut ws, ids) = workspace_with(&["A"]);
        ws.add_split_line(ids[0], vec![Point::new(0.0, 100.0)], SurfaceSize::new(100.0, 200.0))
            .expect("line");
        ws.apply_split(ids[0]).expect("split");
        let segment = ws.pages()[0].id;
        assert!(matches!(
            ws.add_split_line(segment, vec![Point::new(0.0, 10.0)], SurfaceSize::new(1.0, 1.0)),
            Err(BlattwerkError::SplitLinesOnSegment(_))
        ));
    }

    #[test]
    fn rotations_stay_normalised() {
        let (mut ws, ids) = workspace_with(&["A"]);
        assert_eq!(ws.rotate_left(ids[0]).expect("rotate"), Rotation::Deg270);
        assert_eq!(ws.rotate_right(ids[0]).expect("rotate"), Rotation::Deg0);
        assert_eq!(ws.rotate_right(ids[0]).expect("rotate"), Rotation::Deg90);
    }

    #[test]
    fn rotate_selected_touches_only_selection() {
        let (mut ws, ids) = workspace_with(&["A", "B", "C"]);
        let state = ws.sessions().ui().clone().with_selection([ids[0], ids[2]]);
        ws.sessions_mut().set_ui(state);
        assert_eq!(ws.rotate_selected(RotateDirection::Right), 2);
        let rotations: Vec<i32> = ws.pages().iter().map(|p| p.rotation.degrees()).collect();
        assert_eq!(rotations, vec![90, 0, 90]);
    }

    #[test]
    fn invalid_crop_is_rejected() {
        let (mut ws, ids) = workspace_with(&["A"]);
        assert!(matches!(
            ws.set_crop(ids[0], CropRect::new(90, 0, 20, 10)),
            Err(BlattwerkError::InvalidCrop { .. })
        ));
        ws.set_crop(ids[0], CropRect::new(10, 10, 50, 50)).expect("crop");
        assert_eq!(ws.pages()[0].crop, CropRect::new(10, 10, 50, 50));
    }

    #[test]
    fn delete_duplicate_move_and_undo() {
        let (mut ws, ids) = workspace_with(&["A", "B", "C"]);

        let copy = ws.duplicate_page(ids[0]).expect("duplicate");
        assert_eq!(names(&ws), vec!["A", "A", "B", "C"]);
        assert_eq!(ws.pages()[1].id, copy);

        assert_eq!(ws.move_page(ids[2], -10).expect("move"), 0);
        assert_eq!(names(&ws), vec!["C", "A", "A", "B"]);

        assert_eq!(ws.delete_pages(&[ids[1], PageId::new()]).expect("delete"), 1);
        assert_eq!(names(&ws), vec!["C", "A", "A"]);

        assert!(ws.undo());
        assert_eq!(names(&ws), vec!["C", "A", "A", "B"]);
        assert!(matches!(
            ws.delete_pages(&[PageId::new()]),
            Err(BlattwerkError::PageNotFound(_))
        ));
    }

    #[test]
    fn replace_then_reset_to_original() {
        let (mut ws, ids) = workspace_with(&["A"]);
        let original = ws.pages()[0].raster.clone();
        ws.rotate_right(ids[0]).expect("rotate");
        ws.replace_raster(ids[0], raster(99, 50, 50)).expect("replace");
        let page = ws.page(ids[0]).expect("page");
        assert!(!page.is_original);
        assert_eq!(page.crop, CropRect::full(50, 50));

        ws.reset_to_original(ids[0]).expect("reset");
        let page = ws.page(ids[0]).expect("page");
        assert!(page.is_original);
        assert_eq!(page.raster, original);
        assert_eq!(page.rotation, Rotation::Deg0);
        assert_eq!(page.crop, CropRect::full(100, 200));
    }

    #[test]
    fn install_into_background_session() {
        let (mut ws, _) = workspace_with(&["A"]);
        let first = ws.sessions().active_id();
        ws.sessions_mut().create_session();

        let installed = ws.install_pages(first, vec![Page::new("late", raster(7, 10, 10))]);
        assert_eq!(installed, 1);
        assert!(ws.pages().is_empty());

        ws.sessions_mut().switch_to(first).expect("switch");
        assert_eq!(names(&ws), vec!["A", "late"]);
    }

    #[test]
    fn install_into_closed_session_discards() {
        let mut ws = Workspace::default();
        let doomed = ws.sessions_mut().create_session();
        ws.sessions_mut().close(doomed).expect("close");
        assert_eq!(ws.install_pages(doomed, vec![Page::new("x", raster(1, 10, 10))]), 0);
        assert!(ws.pages().is_empty());
    }

    #[test]
    fn history_is_per_session() {
        let (mut ws, ids) = workspace_with(&["A", "B"]);
        let a = ws.sessions().active_id();
        ws.delete_pages(&[ids[0]]).expect("delete");

        ws.sessions_mut().create_session();
        assert!(!ws.undo());
        ws.sessions_mut().switch_to(a).expect("switch");
        assert!(ws.undo());
        assert_eq!(names(&ws), vec!["A", "B"]);
    }

    #[test]
    fn persist_and_restore_sessions() {
        let store = MemoryStore::new();
        let instance = InstanceId::new();
        let mut ws = Workspace::with_instance(instance, EngineConfig::default());
        let second = ws.sessions_mut().create_session();
        ws.sessions_mut().rename(second, "Receipts").expect("rename");
        assert!(ws.persist(&store).expect("persist"));

        let mut fresh = Workspace::with_instance(instance, EngineConfig::default());
        assert!(fresh.restore(&store).expect("restore"));
        assert_eq!(fresh.sessions().len(), 2);
        assert_eq!(fresh.sessions().active_id(), second);

        let mut stranger = Workspace::default();
        assert!(!stranger.restore(&store).expect("restore"));
    }

    #[test]
    fn persist_over_quota_is_not_an_error() {
        let store = MemoryStore::with_quota(16);
        let ws = Workspace::default();
        assert!(!ws.persist(&store).expect("quota tolerated"));
        assert!(store.is_empty());
    }
}
