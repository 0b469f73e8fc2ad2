// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk — compose scanned pages and PDFs into finished documents.
//
// Entry point. Initialises logging and services, then runs one command.

mod commands;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use blattwerk_core::BlattwerkError;
use blattwerk_core::human_errors::humanize_error;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use commands::{ComposeArgs, MergeArgs};
use services::app_services::AppServices;

#[derive(Debug, Parser)]
#[command(name = "blattwerk", version, about = "Compose scanned pages and PDFs into finished documents")]
struct Cli {
    /// JSON engine configuration (defaults to `<data dir>/config.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import images and PDFs, apply edits and export one PDF.
    Compose(ComposeArgs),
    /// Show page count and raster availability of a PDF.
    Inspect { input: PathBuf },
    /// Concatenate PDFs.
    Merge(MergeArgs),
    /// List sessions saved by earlier runs.
    Sessions,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let services = match AppServices::init(config) {
        Ok(services) => services,
        Err(err) => {
            warn!(%err, "Persistent storage failed; using in-memory fallback");
            match AppServices::fallback(config) {
                Ok(services) => services,
                Err(err) => return fail(&err),
            }
        }
    };

    let result = match cli.command {
        Command::Compose(args) => commands::compose(&services, args).await,
        Command::Inspect { input } => commands::inspect(&input),
        Command::Merge(args) => commands::merge(&services, args).await,
        Command::Sessions => commands::sessions(&services),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(&err),
    }
}

fn fail(err: &BlattwerkError) -> ExitCode {
    error!(%err, "Command failed");
    let human = humanize_error(err);
    eprintln!("error: {}\n  {}", human.message, human.suggestion);
    ExitCode::FAILURE
}
