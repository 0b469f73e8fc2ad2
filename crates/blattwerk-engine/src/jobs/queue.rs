// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory job registry shared between the caller and running job tasks.
//
// Jobs are created Pending, become Running when their first unit starts, and
// reach Completed or Failed exactly once. A finished job stays visible for
// the grace period so the caller can read its final status, then a timer
// task removes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{Job, JobId, JobKind, JobStatus, JobSummary, SessionId, UnitOutcome};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

/// Shared registry of tracked jobs. Cloning yields another handle to the
/// same registry.
#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    grace_period: Duration,
}

impl JobQueue {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a job that has not finished yet.
    fn with_open_job<T>(&self, job_id: JobId, f: impl FnOnce(&mut Job) -> T) -> Result<T> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| BlattwerkError::JobNotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Err(BlattwerkError::JobAlreadyFinished(job_id.to_string()));
        }
        Ok(f(job))
    }

    /// Register a new Pending job.
    #[instrument(skip(self))]
    pub fn dispatch(&self, kind: JobKind, session_id: SessionId, total_units: usize) -> JobId {
        let job = Job::new(kind, session_id, total_units);
        let id = job.id;
        self.lock().insert(id, job);
        info!(job_id = %id, "Job dispatched");
        id
    }

    /// Change the number of units once it becomes known.
    pub fn set_total(&self, job_id: JobId, total_units: usize) -> Result<()> {
        self.with_open_job(job_id, |job| job.progress.total = total_units)
    }

    /// Report that unit `current` is underway. Failure notes recorded so far
    /// stay at the end of the message.
    pub fn update_progress(&self, job_id: JobId, current: usize, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.with_open_job(job_id, |job| {
            job.status = JobStatus::Running;
            job.progress.current = current;
            job.message = format!("{message}{}", notes_tail(&job.notes));
        })
    }

    /// Fold one unit's outcome into the job's progress.
    pub fn record_unit(&self, job_id: JobId, outcome: UnitOutcome) -> Result<()> {
        self.with_open_job(job_id, |job| {
            job.status = JobStatus::Running;
            let note = match outcome {
                UnitOutcome::Succeeded => {
                    job.progress.succeeded += 1;
                    None
                }
                UnitOutcome::Failed { note } => {
                    job.progress.failed += 1;
                    Some(note)
                }
                UnitOutcome::Skipped { note } => {
                    job.progress.skipped += 1;
                    Some(note)
                }
            };
            if let Some(note) = note {
                let tail = notes_tail(&job.notes);
                let base = job
                    .message
                    .strip_suffix(tail.as_str())
                    .unwrap_or(&job.message)
                    .to_string();
                job.notes.push(note);
                job.message = format!("{base}{}", notes_tail(&job.notes));
            }
            job.progress.current = job.progress.attempted() + job.progress.skipped;
        })
    }

    /// Move the job to its terminal status. Only the first call succeeds.
    #[instrument(skip(self, message))]
    pub fn complete(
        &self,
        job_id: JobId,
        status: JobStatus,
        message: impl Into<String>,
    ) -> Result<JobSummary> {
        if !status.is_terminal() {
            return Err(BlattwerkError::Task(format!(
                "{status:?} is not a terminal job status"
            )));
        }
        let message = message.into();
        let summary = self.with_open_job(job_id, |job| {
            job.status = status;
            job.message = message;
            job.finished_at = Some(Utc::now());
            job.summary()
        })?;

        match status {
            JobStatus::Failed => error!(job_id = %job_id, summary = %summary.message, "Job failed"),
            _ => info!(job_id = %job_id, summary = %summary.message, "Job finished"),
        }
        self.schedule_purge(job_id);
        Ok(summary)
    }

    /// Finish the job from its recorded progress: Failed when no unit
    /// succeeded, Completed otherwise.
    pub fn finish(&self, job_id: JobId) -> Result<JobSummary> {
        let job = self
            .get(job_id)
            .ok_or_else(|| BlattwerkError::JobNotFound(job_id.to_string()))?;
        let progress = job.progress;
        let status = if progress.succeeded == 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        let mut message = format!(
            "{} of {} {} {}",
            progress.succeeded,
            progress.attempted(),
            job.kind.unit_noun(),
            job.kind.verb()
        );
        if progress.skipped > 0 {
            message.push_str(&format!(", {} skipped", progress.skipped));
        }
        message.push_str(&notes_tail(&job.notes));
        self.complete(job_id, status, message)
    }

    /// Remove the job once the grace period has passed. Outside a Tokio
    /// runtime the job stays until `purge_expired` runs.
    fn schedule_purge(&self, job_id: JobId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(job_id = %job_id, "No runtime; job left for purge_expired");
            return;
        };
        let jobs = Arc::clone(&self.jobs);
        let grace = self.grace_period;
        handle.spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_id);
            if removed.is_some() {
                debug!(job_id = %job_id, "Finished job purged");
            }
        });
    }

    // -- Queries --------------------------------------------------------------

    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.lock().get(&job_id).cloned()
    }

    /// Every tracked job, oldest first.
    pub fn active_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn jobs_for_session(&self, session_id: SessionId) -> Vec<Job> {
        self.active_jobs()
            .into_iter()
            .filter(|j| j.session_id == session_id)
            .collect()
    }

    /// Drop finished jobs whose grace period has elapsed; returns how many.
    pub fn purge_expired(&self) -> usize {
        let grace = match chrono::Duration::from_std(self.grace_period) {
            Ok(grace) => grace,
            Err(err) => {
                warn!(%err, "Grace period out of range; nothing purged");
                return 0;
            }
        };
        let now = Utc::now();
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| job.finished_at.is_none_or(|at| at + grace > now));
        before - jobs.len()
    }
}

/// " (note; note)" suffix, or nothing without notes.
fn notes_tail(notes: &[String]) -> String {
    if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join("; "))
    }
}
