// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identifiers, job and session records for the Blattwerk engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a page.
    PageId
);
uuid_id!(
    /// Unique identifier for an editing session ("tab").
    SessionId
);
uuid_id!(
    /// Unique identifier for a tracked job.
    JobId
);
uuid_id!(
    /// Identifier of one running process instance; keys the persisted
    /// session manifest.
    InstanceId
);

/// Encoded raster formats the engine accepts as page sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Gif,
    Webp,
}

impl RasterFormat {
    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

/// The kind of multi-unit operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Decode image files into pages.
    Import,
    /// Pull page rasters out of an existing PDF.
    Extract,
    /// Composite a session's pages into a new PDF.
    Export,
    /// Concatenate several PDFs.
    Merge,
}

impl JobKind {
    /// Noun used in progress messages ("3 of 4 pages exported").
    pub fn unit_noun(&self) -> &'static str {
        match self {
            Self::Import => "images",
            Self::Extract | Self::Export => "pages",
            Self::Merge => "documents",
        }
    }

    /// Past-tense verb used in progress messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Import => "imported",
            Self::Extract => "extracted",
            Self::Export => "exported",
            Self::Merge => "merged",
        }
    }
}

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Dispatched, no unit started yet.
    Pending,
    /// At least one unit has started.
    Running,
    /// Finished with at least one successful unit.
    Completed,
    /// Finished with zero successful units.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Structured progress payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Units processed so far (any outcome).
    pub current: usize,
    /// Units the job was dispatched with.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Units that were actually attempted (skipped units excluded).
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Outcome of a single unit inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOutcome {
    Succeeded,
    Failed { note: String },
    Skipped { note: String },
}

/// A tracked asynchronous multi-unit operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Weak reference: the session may be closed while the job runs.
    pub session_id: SessionId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: JobProgress,
    /// Latest progress line followed by the failure notes so far.
    pub message: String,
    /// One note per failed or skipped unit.
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(kind: JobKind, session_id: SessionId, total_units: usize) -> Self {
        Self {
            id: JobId::new(),
            session_id,
            kind,
            status: JobStatus::Pending,
            progress: JobProgress::new(total_units),
            message: String::new(),
            notes: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Manifest-level summary of this job.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            kind: self.kind,
            status: self.status,
            succeeded: self.progress.succeeded,
            attempted: self.progress.attempted(),
            skipped: self.progress.skipped,
            notes: self.notes.clone(),
            message: self.message.clone(),
        }
    }
}

/// Summary reported for every finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub succeeded: usize,
    pub attempted: usize,
    pub skipped: usize,
    pub notes: Vec<String>,
    pub message: String,
}

/// Persisted metadata for one session. Page pixels are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: SessionId,
    pub name: String,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub active: bool,
}
