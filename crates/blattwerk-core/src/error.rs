// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.

use thiserror::Error;

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum BlattwerkError {
    // -- Per-unit errors (caught inside jobs) --
    #[error("could not decode source: {0}")]
    Decode(String),

    #[error("unit {unit} exceeded the {seconds}s render deadline")]
    RenderTimeout { unit: String, seconds: u64 },

    #[error("input {name} is {size} bytes, above the {limit} byte limit")]
    OversizeInput { name: String, size: u64, limit: u64 },

    #[error("could not encode raster: {0}")]
    Encode(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("unit task aborted: {0}")]
    Task(String),

    // -- Editing errors (synchronous, no mutation) --
    #[error("invalid reorder specification: {0}")]
    InvalidReorderSpecification(String),

    #[error("invalid crop {width}x{height}+{x}+{y} for a {raster_width}x{raster_height} raster")]
    InvalidCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    #[error("page {0} is a split segment and cannot take split lines")]
    SplitLinesOnSegment(String),

    #[error("page {0} not found")]
    PageNotFound(String),

    // -- Sessions --
    #[error("cannot close the last remaining session")]
    EmptySessionSetViolation,

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session name must not be empty")]
    InvalidSessionName,

    // -- Jobs --
    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {0} already finished")]
    JobAlreadyFinished(String),

    // -- Storage / persistence --
    #[error("storage quota exceeded writing {key}: {size} bytes, quota {quota}")]
    StorageQuotaExceeded { key: String, size: u64, quota: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlattwerkError {
    /// Whether this error is scoped to a single job unit.
    ///
    /// Unit-scoped errors are caught by the job runner and folded into the
    /// job's aggregate outcome instead of aborting the job.
    pub fn is_unit_scoped(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::RenderTimeout { .. }
                | Self::OversizeInput { .. }
                | Self::Encode(_)
                | Self::Pdf(_)
                | Self::Task(_)
        )
    }

    /// Whether the unit should be counted as skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::OversizeInput { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlattwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scoped_classification() {
        assert!(BlattwerkError::Decode("bad header".into()).is_unit_scoped());
        assert!(
            BlattwerkError::RenderTimeout {
                unit: "page 3".into(),
                seconds: 30
            }
            .is_unit_scoped()
        );
        assert!(!BlattwerkError::EmptySessionSetViolation.is_unit_scoped());
        assert!(!BlattwerkError::InvalidReorderSpecification("x".into()).is_unit_scoped());
    }

    #[test]
    fn only_oversize_is_a_skip() {
        let oversize = BlattwerkError::OversizeInput {
            name: "scan.tiff".into(),
            size: 10,
            limit: 5,
        };
        assert!(oversize.is_skip());
        assert!(!BlattwerkError::Decode("x".into()).is_skip());
    }
}
