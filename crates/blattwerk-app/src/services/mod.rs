// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: data directory, configuration, persistent store and the
// instance identity the session manifest is keyed by.

pub mod app_services;
pub mod data_dir;
