// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background jobs: the shared status table and the runner that drives units.

pub mod queue;
pub mod runner;

pub use queue::JobQueue;
pub use runner::{ExportArtifact, ExportedUnit, JobHandle, JobOutput, JobRunner, MergeArtifact, NamedInput};
