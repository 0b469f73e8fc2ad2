// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session manager — the set of editing sessions ("tabs"), the active-session
// pointer, and the editor UI state that belongs to whichever session is live.
//
// The active session's pages live outside its stored record while it is
// being edited; switching flushes them back and loads the target's list.

use std::collections::{BTreeMap, BTreeSet};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{Page, PageId, SessionId, SessionMeta};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::history::History;

/// Position and size of a floating editor window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingWindow {
    pub page_id: Option<PageId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Editor UI state of the live session.
///
/// Treated as a value: edits build a new state, and a session switch
/// replaces it wholesale with the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorUiState {
    pub selection: BTreeSet<PageId>,
    pub floating_windows: BTreeMap<String, FloatingWindow>,
    pub zoomed: BTreeSet<PageId>,
    pub rearrange_mode: bool,
}

impl EditorUiState {
    pub fn with_selection(mut self, ids: impl IntoIterator<Item = PageId>) -> Self {
        self.selection = ids.into_iter().collect();
        self
    }

    pub fn with_zoomed(mut self, id: PageId, zoomed: bool) -> Self {
        if zoomed {
            self.zoomed.insert(id);
        } else {
            self.zoomed.remove(&id);
        }
        self
    }

    pub fn with_window(mut self, name: impl Into<String>, window: FloatingWindow) -> Self {
        self.floating_windows.insert(name.into(), window);
        self
    }

    pub fn with_rearrange_mode(mut self, enabled: bool) -> Self {
        self.rearrange_mode = enabled;
        self
    }

    /// Drop every reference to pages that no longer exist.
    pub fn without_pages(mut self, removed: &BTreeSet<PageId>) -> Self {
        self.selection.retain(|id| !removed.contains(id));
        self.zoomed.retain(|id| !removed.contains(id));
        self.floating_windows
            .retain(|_, w| w.page_id.is_none_or(|id| !removed.contains(&id)));
        self
    }
}

/// Stored record of one session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Stored page list; stale while the session is active.
    pages: Vec<Page>,
    history: History,
}

impl Session {
    fn new(name: String, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name,
            created_at: now,
            modified_at: now,
            pages: Vec::new(),
            history: History::new(history_limit),
        }
    }
}

/// Owns every session. The set is never empty and exactly one session is
/// active.
#[derive(Debug)]
pub struct SessionManager {
    /// In creation order.
    sessions: Vec<Session>,
    active: SessionId,
    live: Vec<Page>,
    ui: EditorUiState,
    created: usize,
    history_limit: usize,
}

impl SessionManager {
    /// A manager holding one empty session, "Session 1".
    pub fn new(history_limit: usize) -> Self {
        let first = Session::new("Session 1".to_string(), history_limit);
        let active = first.id;
        Self {
            sessions: vec![first],
            active,
            live: Vec::new(),
            ui: EditorUiState::default(),
            created: 1,
            history_limit,
        }
    }

    fn index_of(&self, id: SessionId) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| BlattwerkError::SessionNotFound(id.to_string()))
    }

    fn active_index(&self) -> usize {
        self.sessions
            .iter()
            .position(|s| s.id == self.active)
            .unwrap_or(0)
    }

    /// Write the live page list back into the active session's record.
    fn flush_live(&mut self) {
        let index = self.active_index();
        self.sessions[index].pages = self.live.clone();
    }

    fn activate(&mut self, index: usize) {
        self.active = self.sessions[index].id;
        self.live = self.sessions[index].pages.clone();
        self.ui = EditorUiState::default();
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Create an empty session and make it active.
    #[instrument(skip(self))]
    pub fn create_session(&mut self) -> SessionId {
        self.flush_live();
        self.created += 1;
        let session = Session::new(format!("Session {}", self.created), self.history_limit);
        let id = session.id;
        info!(session_id = %id, name = %session.name, "Session created");
        self.sessions.push(session);
        let index = self.sessions.len() - 1;
        self.activate(index);
        id
    }

    /// Make `id` the active session.
    #[instrument(skip(self))]
    pub fn switch_to(&mut self, id: SessionId) -> Result<()> {
        let target = self.index_of(id)?;
        self.flush_live();
        self.activate(target);
        debug!(pages = self.live.len(), "Switched session");
        Ok(())
    }

    /// Close `id`. The last remaining session cannot be closed.
    #[instrument(skip(self))]
    pub fn close(&mut self, id: SessionId) -> Result<()> {
        let index = self.index_of(id)?;
        if self.sessions.len() == 1 {
            return Err(BlattwerkError::EmptySessionSetViolation);
        }
        let was_active = id == self.active;
        self.sessions.remove(index);
        if was_active {
            self.activate(0);
        }
        info!(session_id = %id, remaining = self.sessions.len(), "Session closed");
        Ok(())
    }

    pub fn rename(&mut self, id: SessionId, new_name: &str) -> Result<()> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Err(BlattwerkError::InvalidSessionName);
        }
        let index = self.index_of(id)?;
        let session = &mut self.sessions[index];
        session.name = trimmed.to_string();
        session.modified_at = Utc::now();
        Ok(())
    }

    /// Rebuild the session set from persisted metadata. Pages are not
    /// persisted, so every restored session starts empty.
    pub fn restore(&mut self, metas: &[SessionMeta]) {
        if metas.is_empty() {
            return;
        }
        self.sessions = metas
            .iter()
            .map(|meta| Session {
                id: meta.id,
                name: meta.name.clone(),
                created_at: meta.created_at,
                modified_at: meta.modified_at,
                pages: Vec::new(),
                history: History::new(self.history_limit),
            })
            .collect();
        self.created = self.created.max(self.sessions.len());
        let active = metas.iter().position(|m| m.active).unwrap_or(0);
        self.activate(active);
    }

    // -- Queries --------------------------------------------------------------

    pub fn active_id(&self) -> SessionId {
        self.active
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.iter().any(|s| s.id == id)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Metadata of every session in creation order.
    pub fn sessions(&self) -> Vec<SessionMeta> {
        self.sessions
            .iter()
            .map(|s| {
                let active = s.id == self.active;
                SessionMeta {
                    id: s.id,
                    name: s.name.clone(),
                    page_count: if active { self.live.len() } else { s.pages.len() },
                    created_at: s.created_at,
                    modified_at: s.modified_at,
                    active,
                }
            })
            .collect()
    }

    // -- Live state -----------------------------------------------------------

    /// Pages of the active session.
    pub fn pages(&self) -> &[Page] {
        &self.live
    }

    pub fn pages_mut(&mut self) -> &mut Vec<Page> {
        let index = self.active_index();
        self.sessions[index].modified_at = Utc::now();
        &mut self.live
    }

    pub fn ui(&self) -> &EditorUiState {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut EditorUiState {
        &mut self.ui
    }

    pub fn set_ui(&mut self, state: EditorUiState) {
        self.ui = state;
    }

    pub fn history(&self) -> &History {
        &self.sessions[self.active_index()].history
    }

    /// Page list and history of any session, live or stored.
    pub(crate) fn parts_mut(&mut self, id: SessionId) -> Result<(&mut Vec<Page>, &mut History)> {
        let index = self.index_of(id)?;
        let is_active = id == self.active;
        let session = &mut self.sessions[index];
        session.modified_at = Utc::now();
        let pages = if is_active {
            &mut self.live
        } else {
            &mut session.pages
        };
        Ok((pages, &mut session.history))
    }
}
