// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command implementations. Each command drives the engine end-to-end and
// prints job summaries as they arrive.

use std::path::{Path, PathBuf};

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{JobStatus, JobSummary, PageId, Point, Rotation, SessionId, SurfaceSize};
use blattwerk_document::{PageSource, PdfReader};
use blattwerk_engine::{NamedInput, Workspace};
use clap::Args;
use tracing::{debug, error, info, instrument};

use crate::services::app_services::AppServices;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Split lines for one input page: `PAGE:Y[,Y...]` in raster pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArg {
    pub page: usize,
    pub ys: Vec<f64>,
}

/// Rotation for one input page: `PAGE:DEGREES`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateArg {
    pub page: usize,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Args)]
pub struct ComposeArgs {
    /// Where to write the composed PDF.
    #[arg(long, short)]
    pub out: PathBuf,
    /// Split an imported page at the given heights, e.g. `1:1200,2400`.
    #[arg(long = "split", value_parser = parse_split)]
    pub splits: Vec<SplitArg>,
    /// Rotate an imported page clockwise, e.g. `2:90`.
    #[arg(long = "rotate", value_parser = parse_rotate)]
    pub rotations: Vec<RotateArg>,
    /// Final page order after splitting, e.g. `"3,1,2"`.
    #[arg(long)]
    pub order: Option<String>,
    /// Session name (defaults to the output file stem).
    #[arg(long)]
    pub name: Option<String>,
    /// Images and PDFs, in page order.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct MergeArgs {
    #[arg(long, short)]
    pub out: PathBuf,
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

fn parse_page_number(raw: &str) -> std::result::Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("'{raw}' is not a page number (pages start at 1)")),
        Ok(page) => Ok(page),
    }
}

pub fn parse_split(raw: &str) -> std::result::Result<SplitArg, String> {
    let (page, ys) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected PAGE:Y[,Y...], got '{raw}'"))?;
    let ys = ys
        .split(',')
        .map(|y| {
            y.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| format!("'{y}' is not a height in pixels"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(SplitArg {
        page: parse_page_number(page)?,
        ys,
    })
}

pub fn parse_rotate(raw: &str) -> std::result::Result<RotateArg, String> {
    let (page, degrees) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected PAGE:DEGREES, got '{raw}'"))?;
    let rotation = degrees
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(Rotation::from_degrees)
        .ok_or_else(|| format!("'{degrees}' is not a multiple of 90 degrees"))?;
    Ok(RotateArg {
        page: parse_page_number(page)?,
        rotation,
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Import, edit and export in one new session.
///
/// Rotations and split lines address pages in input order; `--order`
/// applies to the page list after splitting.
#[instrument(skip(services, args), fields(inputs = args.inputs.len()))]
pub async fn compose(services: &AppServices, args: ComposeArgs) -> Result<()> {
    let mut workspace = services.workspace()?;
    let name = args.name.clone().unwrap_or_else(|| file_stem(&args.out));
    let session = compose_session(&mut workspace, &name)?;
    let runner = services.runner();

    for path in &args.inputs {
        let input = read_input(path)?;
        let output = if is_pdf(path, &input.bytes) {
            runner.extract(session, input).wait().await?
        } else {
            runner.import(session, vec![input]).wait().await?
        };
        report(&output.summary);
        workspace.install_pages(session, output.output);
    }

    apply_edits(&mut workspace, &args)?;

    let export = runner
        .export(session, workspace.export_snapshot(), &name)
        .wait()
        .await?;
    report(&export.summary);
    for unit in &export.output.units {
        debug!(page_id = %unit.page_id, width = unit.width, height = unit.height, digest = %unit.digest, "Exported page");
    }
    let Some(pdf) = export.output.pdf else {
        return Err(BlattwerkError::Pdf(format!(
            "nothing was exported ({})",
            export.summary.message
        )));
    };
    std::fs::write(&args.out, pdf)?;
    println!(
        "Wrote {} ({} pages)",
        args.out.display(),
        export.output.units.len()
    );

    services.persist(&workspace)
}

/// Activate the session named `name`, creating it on first use. Restored
/// sessions carry no pages, so repeated runs reuse one manifest entry.
fn compose_session(workspace: &mut Workspace, name: &str) -> Result<SessionId> {
    let existing = workspace
        .sessions()
        .sessions()
        .into_iter()
        .find(|meta| meta.name == name.trim())
        .map(|meta| meta.id);
    if let Some(id) = existing {
        debug!(session_id = %id, name, "Reusing saved session");
        workspace.sessions_mut().switch_to(id)?;
        return Ok(id);
    }
    let id = workspace.sessions_mut().create_session();
    workspace.sessions_mut().rename(id, name)?;
    Ok(id)
}

fn apply_edits(workspace: &mut Workspace, args: &ComposeArgs) -> Result<()> {
    let ids: Vec<PageId> = workspace.pages().iter().map(|p| p.id).collect();

    for rotate in &args.rotations {
        let id = page_at(&ids, rotate.page)?;
        for _ in 0..rotate.rotation.degrees() / 90 {
            workspace.rotate_right(id)?;
        }
    }

    for split in &args.splits {
        let id = page_at(&ids, split.page)?;
        let (width, height) = workspace
            .page(id)
            .map(|p| (f64::from(p.raster.width()), f64::from(p.raster.height())))
            .ok_or_else(|| BlattwerkError::PageNotFound(id.to_string()))?;
        for &y in &split.ys {
            workspace.add_split_line(
                id,
                vec![Point::new(0.0, y), Point::new(width, y)],
                SurfaceSize::new(width, height),
            )?;
        }
    }
    if !args.splits.is_empty() {
        let report = workspace.apply_split_all()?;
        info!(
            pages_split = report.pages_split,
            segments = report.segments_created,
            degenerate = report.degenerate_pages,
            "Split applied"
        );
    }

    if let Some(order) = &args.order {
        workspace.apply_input_rearrange(order)?;
    }
    Ok(())
}

/// Print page count and per-page raster availability of a PDF.
pub fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let reader = PdfReader::from_bytes(&bytes)?;
    println!("{}: {} pages", path.display(), reader.page_count());
    for index in 0..reader.page_count() {
        match reader.rasterize(index, 1.0) {
            Ok(raster) => println!(
                "  page {}: {}x{} {}",
                index + 1,
                raster.width(),
                raster.height(),
                raster.format().mime_type()
            ),
            Err(err) => println!("  page {}: no raster ({err})", index + 1),
        }
    }
    Ok(())
}

#[instrument(skip(services, args), fields(inputs = args.inputs.len()))]
pub async fn merge(services: &AppServices, args: MergeArgs) -> Result<()> {
    let workspace = services.workspace()?;
    let inputs = args
        .inputs
        .iter()
        .map(|path| read_input(path))
        .collect::<Result<Vec<_>>>()?;

    let output = services
        .runner()
        .merge(workspace.sessions().active_id(), inputs)
        .wait()
        .await?;
    report(&output.summary);
    let Some(pdf) = output.output.pdf else {
        return Err(BlattwerkError::Pdf(format!(
            "nothing was merged ({})",
            output.summary.message
        )));
    };
    std::fs::write(&args.out, pdf)?;
    println!(
        "Wrote {} ({} pages)",
        args.out.display(),
        output.output.page_count
    );
    Ok(())
}

/// List the sessions saved by earlier runs.
pub fn sessions(services: &AppServices) -> Result<()> {
    let workspace = services.workspace()?;
    for meta in workspace.sessions().sessions() {
        let marker = if meta.active { '*' } else { ' ' };
        println!(
            "{marker} {}  {}  modified {}",
            meta.id,
            meta.name,
            meta.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_input(path: &Path) -> Result<NamedInput> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(NamedInput::new(name, bytes))
}

fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    by_extension || bytes.starts_with(b"%PDF-")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn page_at(ids: &[PageId], page: usize) -> Result<PageId> {
    page.checked_sub(1)
        .and_then(|index| ids.get(index).copied())
        .ok_or_else(|| BlattwerkError::PageNotFound(format!("page {page} of {}", ids.len())))
}

fn report(summary: &JobSummary) {
    match summary.status {
        JobStatus::Failed => error!(job_id = %summary.job_id, kind = ?summary.kind, "{}", summary.message),
        _ => info!(job_id = %summary.job_id, kind = ?summary.kind, "{}", summary.message),
    }
    println!("{:?}: {}", summary.kind, summary.message);
}
