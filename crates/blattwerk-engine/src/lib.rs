// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk engine: split-line segmentation, undo history, editing sessions
// and the background job system that imports, extracts, exports and merges
// documents off the editing thread.

pub mod history;
pub mod jobs;
pub mod rearrange;
pub mod session;
pub mod split;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use history::History;
pub use jobs::{ExportArtifact, JobHandle, JobOutput, JobQueue, JobRunner, MergeArtifact, NamedInput};
pub use rearrange::parse_rearrange;
pub use session::{EditorUiState, FloatingWindow, Session, SessionManager};
pub use split::{SplitOutcome, SplitReport, SplitSettings, SurfaceTransform, split_page};
pub use workspace::Workspace;
