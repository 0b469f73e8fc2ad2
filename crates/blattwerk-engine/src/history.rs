// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Snapshot-based undo over a session's page list. Entries are full copies of
// the page metadata; raster buffers are shared, never duplicated.

use blattwerk_core::Page;

/// Undo stack with a cursor. There is no redo.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Vec<Page>>,
    /// Number of entries that can still be undone.
    cursor: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record `pages` as the state to return to on the next undo.
    pub fn snapshot(&mut self, pages: &[Page]) {
        self.entries.truncate(self.cursor);
        self.entries.push(pages.to_vec());
        if self.entries.len() > self.limit {
            let overflow = self.entries.len() - self.limit;
            self.entries.drain(..overflow);
        }
        self.cursor = self.entries.len();
    }

    /// Step back one entry and return its page list, or `None` when nothing
    /// is left to undo.
    pub fn undo(&mut self) -> Option<Vec<Page>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
