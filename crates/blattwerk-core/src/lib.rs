// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk — Core page, session and job types shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod page;
pub mod types;

pub use config::EngineConfig;
pub use error::BlattwerkError;
pub use page::*;
pub use types::*;
