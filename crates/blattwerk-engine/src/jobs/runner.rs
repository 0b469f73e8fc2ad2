// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job runner — executes import, extract, export and merge jobs as Tokio
// tasks, one unit at a time.
//
// Every unit runs on the blocking pool raced against the unit deadline. A
// failing unit is logged, noted on the job and left out of the output; the
// job as a whole fails only when no unit succeeded. Jobs work on owned
// inputs handed over at dispatch and never look at a session again.

use std::sync::Arc;
use std::time::Duration;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{
    EngineConfig, JobId, JobKind, JobStatus, JobSummary, Page, PageId, SessionId, UnitOutcome,
};
use blattwerk_document::{
    ComposedPage, Compositor, DocumentBuilder, ImageCodec, PageSource, PdfMerger, PdfReader,
    PdfWriter, PlacementRect, RasterCodec,
};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::queue::JobQueue;

/// A named input buffer (file name plus bytes).
#[derive(Debug, Clone)]
pub struct NamedInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl NamedInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Final summary plus whatever the job produced.
#[derive(Debug, Clone)]
pub struct JobOutput<T> {
    pub summary: JobSummary,
    pub output: T,
}

/// One exported page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedUnit {
    pub page_id: PageId,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the composited PNG.
    pub digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExportArtifact {
    /// `None` when no page could be composited.
    pub pdf: Option<Vec<u8>>,
    pub units: Vec<ExportedUnit>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeArtifact {
    pub pdf: Option<Vec<u8>>,
    pub page_count: usize,
}

/// Handle to a job running in the background.
#[derive(Debug)]
pub struct JobHandle<T> {
    pub job_id: JobId,
    task: JoinHandle<Result<JobOutput<T>>>,
}

impl<T> JobHandle<T> {
    /// Wait for the job to reach its terminal status.
    pub async fn wait(self) -> Result<JobOutput<T>> {
        self.task
            .await
            .map_err(|err| BlattwerkError::Task(format!("job task aborted: {err}")))?
    }
}

type UnitWork<T> = Box<dyn FnOnce() -> Result<T> + Send>;

struct Unit<T> {
    label: String,
    size: u64,
    work: UnitWork<T>,
}

impl<T> Unit<T> {
    fn new(label: impl Into<String>, size: u64, work: impl FnOnce() -> Result<T> + Send + 'static) -> Self {
        Self {
            label: label.into(),
            size,
            work: Box::new(work),
        }
    }
}

/// Runs jobs against a shared [`JobQueue`].
///
/// Every job method must be called from inside a Tokio runtime.
#[derive(Clone)]
pub struct JobRunner {
    queue: JobQueue,
    config: Arc<EngineConfig>,
    codec: Arc<dyn RasterCodec>,
    unit_timeout: Duration,
}

impl JobRunner {
    pub fn new(config: EngineConfig) -> Self {
        let queue = JobQueue::new(config.job_grace_period());
        Self::with_queue(queue, config)
    }

    pub fn with_queue(queue: JobQueue, config: EngineConfig) -> Self {
        Self {
            queue,
            unit_timeout: config.unit_timeout(),
            config: Arc::new(config),
            codec: Arc::new(ImageCodec),
        }
    }

    /// Swap in another raster codec.
    pub fn with_codec(mut self, codec: Arc<dyn RasterCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Override the per-unit deadline.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    // -- Unit execution -------------------------------------------------------

    async fn run_unit<T: Send + 'static>(&self, label: &str, size: u64, work: UnitWork<T>) -> Result<T> {
        if size > self.config.max_input_bytes {
            return Err(BlattwerkError::OversizeInput {
                name: label.to_string(),
                size,
                limit: self.config.max_input_bytes,
            });
        }
        match tokio::time::timeout(self.unit_timeout, tokio::task::spawn_blocking(work)).await {
            Err(_) => Err(BlattwerkError::RenderTimeout {
                unit: label.to_string(),
                seconds: self.unit_timeout.as_secs(),
            }),
            Ok(Err(join)) => Err(BlattwerkError::Task(format!("{label}: {join}"))),
            Ok(Ok(result)) => result,
        }
    }

    fn report_progress(&self, job_id: JobId, index: usize, total: usize, label: &str) {
        let progress = format!("Processing {label} ({} of {total})", index + 1);
        if let Err(err) = self.queue.update_progress(job_id, index + 1, progress) {
            debug!(%err, "Progress update rejected");
        }
    }

    /// Log one unit's result and fold it into the job. Errors that are not
    /// scoped to a unit are handed back so the caller can abort the job.
    fn record<T>(&self, job_id: JobId, label: &str, result: Result<T>) -> Result<Option<T>> {
        let (value, outcome) = match result {
            Ok(value) => (Some(value), UnitOutcome::Succeeded),
            Err(err) if !err.is_unit_scoped() => return Err(err),
            Err(err) if err.is_skip() => {
                warn!(job_id = %job_id, unit = %label, %err, "Unit skipped");
                (None, UnitOutcome::Skipped { note: format!("{label}: {err}") })
            }
            Err(err) => {
                warn!(job_id = %job_id, unit = %label, %err, "Unit failed");
                (None, UnitOutcome::Failed { note: format!("{label}: {err}") })
            }
        };
        if let Err(err) = self.queue.record_unit(job_id, outcome) {
            debug!(%err, "Unit outcome rejected");
        }
        Ok(value)
    }

    /// Run `units` in order, folding each outcome into the job. Returns the
    /// successful outputs in unit order.
    async fn drive<T: Send + 'static>(&self, job_id: JobId, units: Vec<Unit<T>>) -> Result<Vec<T>> {
        let total = units.len();
        let mut outputs = Vec::with_capacity(total);

        for (index, unit) in units.into_iter().enumerate() {
            self.report_progress(job_id, index, total, &unit.label);
            let result = self.run_unit(&unit.label, unit.size, unit.work).await;
            if let Some(value) = self.record(job_id, &unit.label, result)? {
                outputs.push(value);
            }
        }
        Ok(outputs)
    }

    fn conclude<T>(&self, job_id: JobId, output: T) -> Result<JobOutput<T>> {
        let summary = self.queue.finish(job_id)?;
        Ok(JobOutput { summary, output })
    }

    /// End the job as Failed without running its remaining units.
    fn abort<T: Default>(&self, job_id: JobId, err: BlattwerkError) -> Result<JobOutput<T>> {
        let summary = self
            .queue
            .complete(job_id, JobStatus::Failed, format!("job aborted: {err}"))?;
        Ok(JobOutput {
            summary,
            output: T::default(),
        })
    }

    // -- Jobs -----------------------------------------------------------------

    /// Decode image files into pages.
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub fn import(&self, session_id: SessionId, inputs: Vec<NamedInput>) -> JobHandle<Vec<Page>> {
        let job_id = self.queue.dispatch(JobKind::Import, session_id, inputs.len());
        let runner = self.clone();

        let task = tokio::spawn(async move {
            let units = inputs
                .into_iter()
                .map(|input| {
                    let codec = Arc::clone(&runner.codec);
                    let size = input.bytes.len() as u64;
                    let label = input.name.clone();
                    Unit::new(label, size, move || {
                        let raster = codec.load(input.bytes)?;
                        Ok(Page::new(input.name, raster))
                    })
                })
                .collect();
            match runner.drive(job_id, units).await {
                Ok(pages) => runner.conclude(job_id, pages),
                Err(err) => runner.abort(job_id, err),
            }
        });
        JobHandle { job_id, task }
    }

    /// Pull one page per embedded raster out of a PDF.
    #[instrument(skip(self, input), fields(name = %input.name, bytes = input.bytes.len()))]
    pub fn extract(&self, session_id: SessionId, input: NamedInput) -> JobHandle<Vec<Page>> {
        let job_id = self.queue.dispatch(JobKind::Extract, session_id, 0);
        let runner = self.clone();
        let scale = self.config.extract_scale;

        let task = tokio::spawn(async move {
            let NamedInput { name, bytes } = input;
            let size = bytes.len() as u64;
            let open: UnitWork<PdfReader> = Box::new(move || PdfReader::from_bytes(&bytes));

            let opened = runner.run_unit(&name, size, open).await;
            let reader = match opened {
                Ok(reader) => Arc::new(reader),
                Err(err) => {
                    runner.queue.set_total(job_id, 1)?;
                    return match runner.record::<PdfReader>(job_id, &name, Err(err)) {
                        Ok(_) => runner.conclude(job_id, Vec::new()),
                        Err(err) => runner.abort(job_id, err),
                    };
                }
            };

            let page_count = reader.page_count();
            runner.queue.set_total(job_id, page_count)?;
            let units = (0..page_count)
                .map(|index| {
                    let reader = Arc::clone(&reader);
                    let label = format!("{name} p.{}", index + 1);
                    let page_name = label.clone();
                    Unit::new(label, 0, move || {
                        let raster = reader.rasterize(index, scale)?;
                        Ok(Page::new(page_name, raster))
                    })
                })
                .collect();
            match runner.drive(job_id, units).await {
                Ok(pages) => runner.conclude(job_id, pages),
                Err(err) => runner.abort(job_id, err),
            }
        });
        JobHandle { job_id, task }
    }

    /// Composite `pages` in order through the runner's codec and assemble
    /// them into a PDF.
    #[instrument(skip(self, pages, title), fields(pages = pages.len()))]
    pub fn export(
        &self,
        session_id: SessionId,
        pages: Vec<Page>,
        title: impl Into<String>,
    ) -> JobHandle<ExportArtifact> {
        let job_id = self.queue.dispatch(JobKind::Export, session_id, pages.len());
        let runner = self.clone();
        let title = title.into();
        let dpi = self.config.export_dpi;

        let task = tokio::spawn(async move {
            let units = pages
                .into_iter()
                .enumerate()
                .map(|(index, page)| {
                    let codec = Arc::clone(&runner.codec);
                    let size = page.raster.len() as u64;
                    Unit::new(format!("page {}", index + 1), size, move || {
                        Compositor::new().render_with(codec.as_ref(), &page)
                    })
                })
                .collect();
            let composed = match runner.drive(job_id, units).await {
                Ok(composed) => composed,
                Err(err) => return runner.abort(job_id, err),
            };
            if composed.is_empty() {
                return runner.conclude(job_id, ExportArtifact::default());
            }

            let exported: Vec<ExportedUnit> = composed
                .iter()
                .map(|c| ExportedUnit {
                    page_id: c.page_id,
                    width: c.width,
                    height: c.height,
                    digest: c.digest.clone(),
                })
                .collect();

            let assembled =
                tokio::task::spawn_blocking(move || assemble_pdf(&title, &composed, dpi))
                    .await
                    .map_err(|err| BlattwerkError::Task(format!("PDF assembly aborted: {err}")))
                    .and_then(|result| result);
            match assembled {
                Ok(pdf) => runner.conclude(
                    job_id,
                    ExportArtifact {
                        pdf: Some(pdf),
                        units: exported,
                    },
                ),
                Err(err) => {
                    let summary = runner.queue.complete(
                        job_id,
                        JobStatus::Failed,
                        format!("PDF assembly failed: {err}"),
                    )?;
                    Ok(JobOutput {
                        summary,
                        output: ExportArtifact {
                            pdf: None,
                            units: exported,
                        },
                    })
                }
            }
        });
        JobHandle { job_id, task }
    }

    /// Concatenate PDFs. Each document is one unit: it counts as merged
    /// only once its pages have been appended.
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub fn merge(&self, session_id: SessionId, inputs: Vec<NamedInput>) -> JobHandle<MergeArtifact> {
        let job_id = self.queue.dispatch(JobKind::Merge, session_id, inputs.len());
        let runner = self.clone();

        let task = tokio::spawn(async move {
            let total = inputs.len();
            let mut merger = PdfMerger::new();

            for (index, input) in inputs.into_iter().enumerate() {
                let NamedInput { name, bytes } = input;
                runner.report_progress(job_id, index, total, &name);
                let size = bytes.len() as u64;
                let parse: UnitWork<PdfReader> = Box::new(move || PdfReader::from_bytes(&bytes));

                let appended = match runner.run_unit(&name, size, parse).await {
                    Ok(reader) => match append_blocking(merger, reader).await {
                        Ok((returned, result)) => {
                            merger = returned;
                            result
                        }
                        Err(err) => return runner.abort(job_id, err),
                    },
                    Err(err) => Err(err),
                };
                if let Err(err) = runner.record(job_id, &name, appended) {
                    return runner.abort(job_id, err);
                }
            }

            if merger.document_count() == 0 {
                return runner.conclude(job_id, MergeArtifact::default());
            }
            let page_count = merger.page_count();
            let finished = tokio::task::spawn_blocking(move || merger.finish())
                .await
                .map_err(|err| BlattwerkError::Task(format!("merge aborted: {err}")))
                .and_then(|result| result);

            match finished {
                Ok(pdf) => runner.conclude(
                    job_id,
                    MergeArtifact {
                        pdf: Some(pdf),
                        page_count,
                    },
                ),
                Err(err) => {
                    let summary =
                        runner
                            .queue
                            .complete(job_id, JobStatus::Failed, format!("merge failed: {err}"))?;
                    Ok(JobOutput {
                        summary,
                        output: MergeArtifact::default(),
                    })
                }
            }
        });
        JobHandle { job_id, task }
    }
}

/// Append `reader` to `merger` on the blocking pool, handing the merger back
/// together with the append result.
async fn append_blocking(
    mut merger: PdfMerger,
    reader: PdfReader,
) -> Result<(PdfMerger, Result<usize>)> {
    tokio::task::spawn_blocking(move || {
        let result = merger.append(&reader);
        (merger, result)
    })
    .await
    .map_err(|err| BlattwerkError::Task(format!("merge aborted: {err}")))
}

/// One PDF page per composited raster, sized from its pixels at `dpi`.
fn assemble_pdf(title: &str, composed: &[ComposedPage], dpi: f32) -> Result<Vec<u8>> {
    let mut writer = PdfWriter::new(title);
    for page in composed {
        let image = writer.embed_raster(&page.png)?;
        let (width_pt, height_pt) = PdfWriter::page_size_for(page.width, page.height, dpi);
        let handle = writer.add_page(width_pt, height_pt);
        writer.draw_image(handle, image, PlacementRect::full_page(width_pt, height_pt))?;
    }
    writer.save()
}
