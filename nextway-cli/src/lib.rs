//! Command-line interface for loading transit feeds into region stores.
#![forbid(unsafe_code)]

use std::io::{ErrorKind, Write};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use nextway_data::{ExtractDepth, FeedInput};
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

mod error;
mod ingest;
mod validate;

pub use error::CliError;

use ingest::{IngestArgs, run_ingest_with};
use validate::{ValidateArgs, run_validate_with};

pub(crate) const ARG_FEED: &str = "feed";
pub(crate) const ARG_REGION: &str = "region";
pub(crate) const ARG_STORE_DIR: &str = "store-dir";
pub(crate) const ARG_WORK_DIR: &str = "work-dir";
pub(crate) const ARG_MAX_DEPTH: &str = "max-depth";
pub(crate) const ENV_INGEST_FEED: &str = "NEXTWAY_CMDS_INGEST_FEED";
pub(crate) const ENV_INGEST_REGION: &str = "NEXTWAY_CMDS_INGEST_REGION";
pub(crate) const ENV_VALIDATE_FEED: &str = "NEXTWAY_CMDS_VALIDATE_FEED";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Validate(args) => run_validate_with(args, writer),
        Command::Ingest(args) => run_ingest_with(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "nextway",
    about = "Validate transit feeds and load them into per-region stores",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that a feed directory or archive holds a usable feed.
    Validate(ValidateArgs),
    /// Validate a feed and load it into a region store.
    Ingest(IngestArgs),
}

/// Classify a configured feed path as an archive or a directory.
pub(crate) fn feed_input(path: Utf8PathBuf, field: &'static str) -> Result<FeedInput, CliError> {
    match nextway_fs::file_is_file(&path) {
        Ok(true) => Ok(FeedInput::Archive(path)),
        Ok(false) => Ok(FeedInput::Directory(path)),
        Err(source) if source.kind() == ErrorKind::NotFound => {
            Err(CliError::MissingSourcePath { field, path })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path,
            source,
        }),
    }
}

pub(crate) fn extract_depth(value: Option<i64>) -> Result<ExtractDepth, CliError> {
    value.map_or_else(
        || Ok(ExtractDepth::default()),
        |levels| ExtractDepth::try_from(levels).map_err(CliError::from),
    )
}

pub(crate) fn runtime() -> Result<Runtime, CliError> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

pub(crate) fn write_report<T: Serialize>(
    writer: &mut dyn Write,
    report: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(report).map_err(CliError::SerialiseReport)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
