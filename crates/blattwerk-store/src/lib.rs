// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-store — Local persistence for the Blattwerk engine.
//
// A small key-value seam with a quota-enforcing SQLite backend and an
// in-memory backend, plus the per-instance session manifest stored on top of
// it. Page pixels are never persisted.

pub mod kv;
pub mod manifest;
pub mod sqlite;

pub use kv::{KeyValueStore, MemoryStore};
pub use manifest::{SessionManifest, load_manifest, manifest_key, save_manifest};
pub use sqlite::SqliteStore;
