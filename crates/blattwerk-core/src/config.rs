// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the split engine, job runner, history and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for a single job unit (decode, rasterize or composite).
    pub unit_timeout_secs: u64,
    /// How long a finished job stays visible before it is purged.
    pub job_grace_period_secs: u64,
    /// Split bands shorter than this (in raster pixels) are dropped.
    pub min_segment_height: u32,
    /// Order offset between consecutive split segments.
    pub split_order_epsilon: f64,
    /// Inputs larger than this are skipped with a warning.
    pub max_input_bytes: u64,
    /// Maximum number of undo entries kept per session.
    pub history_limit: usize,
    /// Resolution used to size exported PDF pages from pixel dimensions.
    pub export_dpi: f32,
    /// Scale applied when rasterizing extracted PDF pages.
    pub extract_scale: f32,
    /// Byte quota of the key-value store.
    pub storage_quota_bytes: u64,
}

impl EngineConfig {
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_secs)
    }

    pub fn job_grace_period(&self) -> Duration {
        Duration::from_secs(self.job_grace_period_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit_timeout_secs: 30,
            job_grace_period_secs: 5,
            min_segment_height: 5,
            split_order_epsilon: 0.001,
            max_input_bytes: 64 * 1024 * 1024,
            history_limit: 50,
            export_dpi: 150.0,
            extract_scale: 1.0,
            storage_quota_bytes: 5 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "unit_timeout_secs": 12 }"#).expect("parse");
        assert_eq!(config.unit_timeout(), Duration::from_secs(12));
        assert_eq!(config.min_segment_height, 5);
        assert_eq!(config.job_grace_period(), Duration::from_secs(5));
    }
}
